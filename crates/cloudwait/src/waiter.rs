//! Convergence waiter: poll a state probe until the observed status has
//! matched the target several times in a row
//!
//! A single matching read against an eventually-consistent backend can be a
//! stale-cache hit or a read racing an in-flight write. The waiter only
//! trusts the target after `continuous_target_occurrence` consecutive
//! matches; any pending or not-found observation in between starts the
//! count over.

use crate::backoff::PollSchedule;
use crate::error::{NotFoundError, TimedOutError, UnexpectedStateError, WaitError};
use crate::pause::{check_cancelled, deadline_after, pause};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Consecutive not-found probes tolerated by default
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// One probe result: the payload and the status label it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    pub value: T,
    pub status: String,
}

impl<T> Observation<T> {
    pub fn new(value: T, status: impl Into<String>) -> Self {
        Self {
            value,
            status: status.into(),
        }
    }
}

pub type ProbeResult<T, E> = Result<Observation<T>, WaitError<E>>;

/// Reads the current remote state
///
/// A probe must be side-effect free apart from its read call. It reports a
/// missing object with `WaitError::NotFound` and any other failure as a
/// terminal error.
pub trait Prober<T, E> {
    fn probe(&mut self) -> impl Future<Output = ProbeResult<T, E>>;
}

impl<T, E, F, Fut> Prober<T, E> for F
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult<T, E>>,
{
    fn probe(&mut self) -> impl Future<Output = ProbeResult<T, E>> {
        self()
    }
}

/// How a not-found probe is treated while waiting for a target status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundPolicy {
    /// Not found ends the wait immediately
    Terminal,

    /// Not found means "still propagating", up to `max_checks` in a row
    Pending { max_checks: u32 },
}

impl Default for NotFoundPolicy {
    fn default() -> Self {
        NotFoundPolicy::Pending {
            max_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }
}

/// Wait configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec {
    /// Wall-clock budget, measured from the first probe
    pub timeout: Duration,

    /// Sleep before the first probe; not counted against `timeout`
    pub delay: Duration,

    /// Floor for every sleep between probes
    pub min_poll_interval: Duration,

    /// Fixed interval between probes instead of the doubling schedule
    pub poll_interval: Option<Duration>,

    /// Consecutive target observations required before success
    pub continuous_target_occurrence: u32,

    /// Statuses that mean "keep waiting"
    pub pending: Vec<String>,

    /// Statuses that count as success
    pub target: Vec<String>,

    pub not_found: NotFoundPolicy,
}

impl WaitSpec {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            delay: Duration::ZERO,
            min_poll_interval: Duration::ZERO,
            poll_interval: None,
            continuous_target_occurrence: 1,
            pending: Vec::new(),
            target: Vec::new(),
            not_found: NotFoundPolicy::default(),
        }
    }

    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = statuses.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Values below one are treated as one
    pub fn continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = occurrences.max(1);
        self
    }

    pub fn not_found(mut self, policy: NotFoundPolicy) -> Self {
        self.not_found = policy;
        self
    }

    fn required_occurrences(&self) -> u32 {
        self.continuous_target_occurrence.max(1)
    }
}

/// Where a wait currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Polling(u32),
    Succeeded,
    TimedOut,
    Failed,
}

impl WaitPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaitPhase::Polling(_))
    }
}

enum Step<T, E> {
    Continue,
    Done(Result<Option<T>, WaitError<E>>),
}

/// Per-wait bookkeeping; owned by a single `run` call
struct Tracker<'a> {
    spec: &'a WaitSpec,
    until_gone: bool,
    phase: WaitPhase,
    not_found_ticks: u32,
    last_state: Option<String>,
    last_not_found: Option<NotFoundError>,
}

impl<'a> Tracker<'a> {
    fn new(spec: &'a WaitSpec, until_gone: bool) -> Self {
        Self {
            spec,
            until_gone,
            phase: WaitPhase::Polling(0),
            not_found_ticks: 0,
            last_state: None,
            last_not_found: None,
        }
    }

    fn consecutive(&self) -> u32 {
        match self.phase {
            WaitPhase::Polling(n) => n,
            _ => 0,
        }
    }

    fn matched<T, E>(&mut self, value: Option<T>) -> Step<T, E> {
        let count = self.consecutive() + 1;
        if count >= self.spec.required_occurrences() {
            self.phase = WaitPhase::Succeeded;
            return Step::Done(Ok(value));
        }
        self.phase = WaitPhase::Polling(count);
        Step::Continue
    }

    fn fail<T, E>(&mut self, err: WaitError<E>) -> Step<T, E> {
        self.phase = WaitPhase::Failed;
        Step::Done(Err(err))
    }

    fn observe<T, E>(&mut self, result: ProbeResult<T, E>) -> Step<T, E> {
        match result {
            Ok(observation) => {
                self.not_found_ticks = 0;
                self.last_not_found = None;
                let status = observation.status;
                let is_target = self.spec.target.contains(&status);
                let is_pending = self.spec.pending.contains(&status);
                self.last_state = Some(status.clone());

                if is_target {
                    self.matched(Some(observation.value))
                } else if is_pending {
                    self.phase = WaitPhase::Polling(0);
                    Step::Continue
                } else {
                    self.fail(WaitError::UnexpectedState(UnexpectedStateError {
                        state: status,
                        expected: self.spec.target.clone(),
                    }))
                }
            }
            Err(WaitError::NotFound(err)) => {
                self.last_state = None;
                if self.until_gone {
                    return self.matched(None);
                }
                match self.spec.not_found {
                    NotFoundPolicy::Terminal => self.fail(WaitError::NotFound(err)),
                    NotFoundPolicy::Pending { max_checks } => {
                        self.phase = WaitPhase::Polling(0);
                        self.not_found_ticks += 1;
                        if self.not_found_ticks > max_checks {
                            let retries = self.not_found_ticks;
                            return self.fail(WaitError::NotFound(err.with_retries(retries)));
                        }
                        self.last_not_found = Some(err);
                        Step::Continue
                    }
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn timed_out<E>(&mut self) -> WaitError<E> {
        self.phase = WaitPhase::TimedOut;
        TimedOutError {
            last_state: self.last_state.take(),
            expected: self.spec.target.clone(),
            timeout: self.spec.timeout,
            last_error: self
                .last_not_found
                .take()
                .map(|err| Box::new(WaitError::NotFound(err))),
        }
        .into()
    }
}

/// Polls a [`Prober`] until convergence, failure or timeout
#[derive(Debug, Clone)]
pub struct ConvergenceWaiter {
    spec: WaitSpec,
    cancel: Option<CancellationToken>,
}

impl ConvergenceWaiter {
    pub fn new(spec: WaitSpec) -> Self {
        Self { spec, cancel: None }
    }

    /// Abort the wait promptly when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn spec(&self) -> &WaitSpec {
        &self.spec
    }

    /// Wait until the probe's status is in `target` for the required number
    /// of consecutive probes and return the last payload
    ///
    /// Not found is never success here, even with an empty `target`; it is
    /// handled by the `WaitSpec`'s [`NotFoundPolicy`]. Use
    /// [`wait_gone`](Self::wait_gone) to wait for an object to disappear.
    pub async fn wait<T, E, P>(&self, mut prober: P) -> Result<T, WaitError<E>>
    where
        P: Prober<T, E>,
    {
        match self.run(&mut prober, false).await? {
            Some(value) => Ok(value),
            None => Err(WaitError::NotFound(NotFoundError::default())),
        }
    }

    /// Wait until the object is gone
    ///
    /// A not-found probe counts as the target, as does any status in
    /// `target` (for example a scheduled-deletion state). Statuses in
    /// `pending` keep the wait going.
    pub async fn wait_gone<T, E, P>(&self, mut prober: P) -> Result<Option<T>, WaitError<E>>
    where
        P: Prober<T, E>,
    {
        self.run(&mut prober, true).await
    }

    async fn run<T, E, P>(&self, prober: &mut P, until_gone: bool) -> Result<Option<T>, WaitError<E>>
    where
        P: Prober<T, E>,
    {
        let cancel = self.cancel.as_ref();
        if !self.spec.delay.is_zero() {
            pause(self.spec.delay, cancel).await?;
        }

        let started = Instant::now();
        let deadline = deadline_after(started, self.spec.timeout);
        let mut schedule = PollSchedule::new(self.spec.min_poll_interval, self.spec.poll_interval);
        let mut tracker = Tracker::new(&self.spec, until_gone);
        let mut probes: u32 = 0;

        loop {
            check_cancelled(cancel)?;

            probes += 1;
            let result = prober.probe().await;
            if let Step::Done(outcome) = tracker.observe(result) {
                tracing::debug!(
                    probes,
                    phase = ?tracker.phase,
                    elapsed = ?started.elapsed(),
                    "wait finished"
                );
                return outcome;
            }

            tracing::trace!(
                probes,
                state = ?tracker.last_state,
                consecutive = tracker.consecutive(),
                "target not yet confirmed"
            );

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let err = tracker.timed_out();
                tracing::warn!(
                    probes,
                    timeout = ?self.spec.timeout,
                    expected = ?self.spec.target,
                    "wait timed out"
                );
                return Err(err);
            }

            let delay = schedule.next_step().min(remaining);
            tracing::trace!(?delay, "waiting before next probe");
            pause(delay, cancel).await?;
        }
    }
}

/// Shorthand for `ConvergenceWaiter::new(spec).wait(prober)`
pub async fn wait_for_state<T, E, P>(spec: WaitSpec, prober: P) -> Result<T, WaitError<E>>
where
    P: Prober<T, E>,
{
    ConvergenceWaiter::new(spec).wait(prober).await
}

/// Wait until a boolean check has returned `true` enough times in a row
///
/// `false` keeps waiting and resets the consecutive count. The pending and
/// target sets of `spec` are replaced.
pub async fn wait_until<E, F, Fut>(spec: WaitSpec, mut check: F) -> Result<(), WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, WaitError<E>>>,
{
    let spec = spec.pending(["false"]).target(["true"]);
    ConvergenceWaiter::new(spec)
        .wait(move || {
            let check = check();
            async move {
                check
                    .await
                    .map(|done| Observation::new((), done.to_string()))
            }
        })
        .await
}
