//! Error taxonomy shared by the retry loop and the convergence waiter
//!
//! Callers branch on the variant, never on the rendered message:
//! `NotFound` after a delete usually means success, `TimedOut` means the
//! remote side is still converging, `Remote` carries the API error verbatim.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Terminal outcome of a retry or wait that did not succeed
#[derive(Error, Debug)]
pub enum WaitError<E> {
    /// The remote object does not exist (or no longer exists)
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The deadline passed before the target condition was confirmed
    #[error(transparent)]
    TimedOut(TimedOutError<E>),

    /// A probe reported a status that is neither pending nor target
    #[error(transparent)]
    UnexpectedState(#[from] UnexpectedStateError),

    /// A terminal error returned by the remote API
    #[error(transparent)]
    Remote(E),

    /// The caller's cancellation token fired while waiting
    #[error("wait cancelled")]
    Cancelled,
}

impl<E> WaitError<E> {
    /// Wrap a remote API error
    pub fn remote(err: E) -> Self {
        WaitError::Remote(err)
    }

    /// Shorthand for a `NotFound` with a message
    pub fn not_found(message: impl Into<String>) -> Self {
        WaitError::NotFound(NotFoundError::new(message))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WaitError::NotFound(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitError::TimedOut(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled)
    }

    /// The remote error, if this is one
    pub fn as_remote(&self) -> Option<&E> {
        match self {
            WaitError::Remote(err) => Some(err),
            _ => None,
        }
    }

    /// The error observed last before a timeout, or `self` otherwise
    ///
    /// Useful to recover the underlying API error from a timed-out retry.
    pub fn root(&self) -> &Self {
        match self {
            WaitError::TimedOut(TimedOutError {
                last_error: Some(last),
                ..
            }) => last.root(),
            other => other,
        }
    }

    /// Convert the remote error type, preserving the variant
    pub fn map_remote<F>(self, f: impl Fn(E) -> F + Copy) -> WaitError<F> {
        match self {
            WaitError::NotFound(err) => WaitError::NotFound(err),
            WaitError::TimedOut(err) => WaitError::TimedOut(TimedOutError {
                last_state: err.last_state,
                expected: err.expected,
                timeout: err.timeout,
                last_error: err.last_error.map(|last| Box::new(last.map_remote(f))),
            }),
            WaitError::UnexpectedState(err) => WaitError::UnexpectedState(err),
            WaitError::Remote(err) => WaitError::Remote(f(err)),
            WaitError::Cancelled => WaitError::Cancelled,
        }
    }
}

impl<E> From<TimedOutError<E>> for WaitError<E> {
    fn from(err: TimedOutError<E>) -> Self {
        WaitError::TimedOut(err)
    }
}

/// The remote object could not be found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotFoundError {
    /// Human readable explanation
    pub message: Option<String>,

    /// Rendering of the request that produced the error, for diagnostics
    pub last_request: Option<String>,

    /// How many consecutive not-found probes were seen before giving up
    pub retries: u32,
}

impl NotFoundError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_last_request(mut self, request: impl fmt::Debug) -> Self {
        self.last_request = Some(format!("{:?}", request));
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) if !message.is_empty() => write!(f, "{}", message),
            _ if self.retries > 0 => {
                write!(f, "couldn't find resource ({} retries)", self.retries)
            }
            _ => write!(f, "couldn't find resource"),
        }
    }
}

impl std::error::Error for NotFoundError {}

/// A wait or retry ran out of time
#[derive(Debug)]
pub struct TimedOutError<E> {
    /// Last status label observed, if any probe completed
    pub last_state: Option<String>,

    /// Status labels that would have counted as success
    pub expected: Vec<String>,

    /// The budget that was exhausted
    pub timeout: Duration,

    /// Error returned by the final attempt
    pub last_error: Option<Box<WaitError<E>>>,
}

impl<E> TimedOutError<E> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_state: None,
            expected: Vec::new(),
            timeout,
            last_error: None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TimedOutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeout while waiting for ")?;
        if self.expected.is_empty() {
            write!(f, "resource to be gone")?;
        } else {
            write!(f, "state to become '{}'", self.expected.join(", "))?;
        }

        let mut extra = Vec::new();
        if let Some(state) = &self.last_state {
            extra.push(format!("last state: '{}'", state));
        }
        if !self.timeout.is_zero() {
            extra.push(format!("timeout: {:?}", self.timeout));
        }
        if !extra.is_empty() {
            write!(f, " ({})", extra.join(", "))?;
        }

        if let Some(last) = &self.last_error {
            write!(f, ": {}", last)?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for TimedOutError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

/// A probe reported a status outside both the pending and target sets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
pub struct UnexpectedStateError {
    pub state: String,
    pub expected: Vec<String>,
}

/// A structured error returned by a remote API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = ApiError> = std::result::Result<T, WaitError<E>>;
