//! Cancellable sleeping and deadline arithmetic

use crate::error::WaitError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in for "no deadline" when `start + timeout` overflows
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

pub(crate) fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Sleep for `delay`, returning early with `Cancelled` if the token fires
pub(crate) async fn pause<E>(
    delay: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<(), WaitError<E>> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(WaitError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}

pub(crate) fn check_cancelled<E>(cancel: Option<&CancellationToken>) -> Result<(), WaitError<E>> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(WaitError::Cancelled),
        _ => Ok(()),
    }
}
