//! Retry loop for mutating calls that can fail transiently
//!
//! The operation runs once immediately. Retryable failures are absorbed
//! until the deadline; the first terminal failure is returned as is. The
//! last sleep is clamped to the deadline so one final attempt always lands
//! at or before it.

use crate::backoff::Backoff;
use crate::classify::{ErrorClassifier, ErrorCodeMatcher, NotFoundClassifier, RemoteError};
use crate::error::{TimedOutError, WaitError};
use crate::pause::{check_cancelled, deadline_after, pause};
use crate::waiter::{ConvergenceWaiter, NotFoundPolicy, Observation, WaitSpec};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RETRY_PENDING: &str = "retryable error";
const RETRY_TARGET: &str = "success";
const STILL_EXISTS: &str = "exists";

/// Retries an operation under an [`ErrorClassifier`]
#[derive(Debug, Clone)]
pub struct RetryLoop<C> {
    timeout: Duration,
    classifier: C,
    backoff: Backoff,
    cancel: Option<CancellationToken>,
}

impl<C> RetryLoop<C> {
    pub fn new(timeout: Duration, classifier: C) -> Self {
        Self {
            timeout,
            classifier,
            backoff: Backoff::default(),
            cancel: None,
        }
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, WaitError<E>>
    where
        C: ErrorClassifier<WaitError<E>>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WaitError<E>>>,
    {
        self.run_notify(op, |_, _, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_retry(attempt, &error, delay)`
    /// before each backoff sleep
    pub async fn run_notify<T, E, F, Fut, N>(
        &self,
        mut op: F,
        mut on_retry: N,
    ) -> Result<T, WaitError<E>>
    where
        C: ErrorClassifier<WaitError<E>>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WaitError<E>>>,
        N: FnMut(u32, &WaitError<E>, Duration),
    {
        let cancel = self.cancel.as_ref();
        let started = Instant::now();
        let deadline = deadline_after(started, self.timeout);
        let mut attempt: u32 = 0;

        loop {
            check_cancelled(cancel)?;

            attempt += 1;
            let err = match op().await {
                Ok(value) => {
                    tracing::debug!(attempt, elapsed = ?started.elapsed(), "operation succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.classifier.is_retryable(&err) {
                tracing::debug!(attempt, "operation failed with a terminal error");
                return Err(err);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(attempt, timeout = ?self.timeout, "retry budget exhausted");
                return Err(TimedOutError {
                    last_state: Some(RETRY_PENDING.to_string()),
                    expected: vec![RETRY_TARGET.to_string()],
                    timeout: self.timeout,
                    last_error: Some(Box::new(err)),
                }
                .into());
            }

            let delay = self.backoff.delay_for_attempt(attempt - 1).min(remaining);
            on_retry(attempt, &err, delay);
            tracing::trace!(attempt, ?delay, "retryable error, backing off");
            pause(delay, cancel).await?;
        }
    }
}

/// Retry `op` while `classifier` marks its error retryable
pub async fn retry_when<T, E, F, Fut, C>(
    timeout: Duration,
    op: F,
    classifier: C,
) -> Result<T, WaitError<E>>
where
    C: ErrorClassifier<WaitError<E>>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError<E>>>,
{
    RetryLoop::new(timeout, classifier).run(op).await
}

/// Retry while the remote error code is one of `codes`
pub async fn retry_when_code_equals<T, E, F, Fut, I, S>(
    timeout: Duration,
    op: F,
    codes: I,
) -> Result<T, WaitError<E>>
where
    E: RemoteError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError<E>>>,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    retry_when(timeout, op, ErrorCodeMatcher::new(codes)).await
}

/// Retry while the operation reports not found
pub async fn retry_when_not_found<T, E, F, Fut>(
    timeout: Duration,
    op: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError<E>>>,
{
    retry_when(timeout, op, NotFoundClassifier).await
}

/// Tolerate not found only for a resource that was just created
///
/// An existing resource that has disappeared must surface as `NotFound`
/// straight away, so for `is_new == false` the operation runs once.
pub async fn retry_when_new_resource_not_found<T, E, F, Fut>(
    timeout: Duration,
    mut op: F,
    is_new: bool,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError<E>>>,
{
    if is_new {
        retry_when_not_found(timeout, op).await
    } else {
        op().await
    }
}

/// Keep calling `op` while it succeeds; not found is success
///
/// Used after a delete to wait for the object to disappear from reads.
pub async fn retry_until_not_found<T, E, F, Fut>(
    timeout: Duration,
    mut op: F,
) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WaitError<E>>>,
{
    let spec = WaitSpec::new(timeout)
        .pending([STILL_EXISTS])
        .not_found(NotFoundPolicy::Terminal);
    ConvergenceWaiter::new(spec)
        .wait_gone(move || {
            let attempt = op();
            async move {
                attempt
                    .await
                    .map(|_| Observation::new((), STILL_EXISTS))
            }
        })
        .await
        .map(|_| ())
}
