//! cloudwait: convergence engine for eventually-consistent cloud APIs
//!
//! Every "wait for propagation", "retry while a dependency is not ready"
//! and "poll until the state reaches the target" step of a cloud resource
//! adapter goes through this crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              resource CRUD layer                 │
//! │   (create key, put policy, revoke grant, ...)    │
//! └──────────┬───────────────────────┬──────────────┘
//!            │ mutation              │ read-back
//! ┌──────────▼──────────┐ ┌──────────▼──────────────┐
//! │      RetryLoop      │ │   ConvergenceWaiter      │
//! │  retry transient    │ │  poll Prober until N     │
//! │  errors to deadline │ │  consecutive targets     │
//! └──────────┬──────────┘ └──────────┬──────────────┘
//!            │                       │
//! ┌──────────▼───────────────────────▼──────────────┐
//! │  ErrorClassifier · Backoff · WaitError sentinels │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cloudwait::{Observation, WaitSpec, wait_for_state};
//! use std::time::Duration;
//!
//! let spec = WaitSpec::new(Duration::from_secs(600))
//!     .pending(["different"])
//!     .target(["matches"])
//!     .continuous_target_occurrence(5)
//!     .min_poll_interval(Duration::from_secs(2));
//!
//! let policy = wait_for_state(spec, || async {
//!     let policy = client.get_key_policy(&key_id).await?;
//!     let status = if equivalent(&policy, &desired) { "matches" } else { "different" };
//!     Ok(Observation::new(policy, status))
//! })
//! .await?;
//! ```

pub mod backoff;
pub mod classify;
pub mod error;
mod pause;
pub mod retry;
pub mod semaphore;
pub mod waiter;

// Re-exports
pub use backoff::Backoff;
pub use classify::{
    AnyOf, ErrorClassifier, ErrorCodeMatcher, Never, NotFoundClassifier, RemoteError, never,
    retry_on_code_message, retry_on_codes, retry_on_not_found,
};
pub use error::{ApiError, NotFoundError, Result, TimedOutError, UnexpectedStateError, WaitError};
pub use retry::{
    RetryLoop, retry_until_not_found, retry_when, retry_when_code_equals,
    retry_when_new_resource_not_found, retry_when_not_found,
};
pub use semaphore::{SemaphoreRegistry, capacity_from_env};
pub use tokio_util::sync::CancellationToken;
pub use waiter::{
    ConvergenceWaiter, DEFAULT_NOT_FOUND_CHECKS, NotFoundPolicy, Observation, ProbeResult, Prober,
    WaitPhase, WaitSpec, wait_for_state, wait_until,
};
