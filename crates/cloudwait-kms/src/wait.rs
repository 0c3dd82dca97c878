//! Read-after-write waits for keys
//!
//! Every mutation of a key is followed by a wait that reads the key back
//! until the new value has been observed several times in a row, since
//! the service may route consecutive reads to replicas that lag behind.
//! The streak length, poll floor and not-found tolerance come from the
//! `propagation` section of [`WaitSettings`].

use crate::api::{KeyManagementApi, KeyMetadata, KeyState, lift};
use crate::error::Result;
use crate::policy::{normalize_policy, policies_are_equivalent};
use chrono::{DateTime, Utc};
use cloudwait::{
    ApiError, ConvergenceWaiter, ErrorCodeMatcher, NotFoundError, Observation, RetryLoop,
    WaitError, WaitSpec, retry_when_new_resource_not_found, wait_for_state,
};
use cloudwait_config::{Operation, WaitSettings};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

pub const KEY_ROTATION_UPDATED_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const KEY_DESCRIPTION_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const KEY_POLICY_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const KEY_STATE_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const KEY_TAGS_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const KEY_VALID_TO_PROPAGATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Error codes seen while a freshly created principal is not yet visible
pub const IAM_PROPAGATION_CODES: [&str; 2] =
    ["MalformedPolicyDocumentException", "InvalidArnException"];

/// Transient service errors worth retrying
pub const TRANSIENT_CODES: [&str; 2] = ["DependencyTimeoutException", "KMSInternalException"];

const MATCHES: &str = "matches";
const DIFFERENT: &str = "different";

/// Classifier for mutations that may race IAM propagation
pub fn iam_propagation_classifier() -> ErrorCodeMatcher {
    ErrorCodeMatcher::new(IAM_PROPAGATION_CODES.iter().chain(TRANSIENT_CODES.iter()).copied())
}

/// `WaitSpec` for a propagation wait bounded by `timeout`
pub fn propagation_spec(settings: &WaitSettings, timeout: Duration) -> WaitSpec {
    WaitSpec {
        timeout,
        ..settings.propagation_spec()
    }
    .pending([DIFFERENT])
    .target([MATCHES])
}

/// Retry a mutation while it fails because a principal it references has
/// not propagated yet
pub async fn wait_iam_propagation<T, F, Fut>(
    settings: &WaitSettings,
    timeout: Duration,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = cloudwait::Result<T>>,
{
    let value = RetryLoop::new(timeout, iam_propagation_classifier())
        .backoff(settings.backoff())
        .run(op)
        .await?;
    Ok(value)
}

/// Poll `read` until `matches` holds for enough consecutive reads
///
/// A not-found read counts as "not there yet".
async fn wait_propagated<T, F, Fut, M>(
    settings: &WaitSettings,
    what: &str,
    timeout: Duration,
    mut read: F,
    matches: M,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = cloudwait::Result<T>>,
    M: Fn(&T) -> cloudwait::Result<bool>,
{
    let matches = &matches;
    let value = wait_for_state(propagation_spec(settings, timeout), move || {
        let pending_read = read();
        async move {
            let value = pending_read.await?;
            let status = if matches(&value)? { MATCHES } else { DIFFERENT };
            Ok::<_, WaitError<ApiError>>(Observation::new(value, status))
        }
    })
    .await?;
    tracing::debug!(what, "change propagated");
    Ok(value)
}

async fn describe(api: &dyn KeyManagementApi, key_id: &str) -> cloudwait::Result<KeyMetadata> {
    lift(api.describe_key(key_id).await, key_id)
}

/// Read a key, treating a key scheduled for deletion as gone
pub async fn find_key_by_id(
    api: &dyn KeyManagementApi,
    key_id: &str,
) -> cloudwait::Result<KeyMetadata> {
    let key = describe(api, key_id).await?;
    if key.key_state == KeyState::PendingDeletion {
        return Err(WaitError::NotFound(
            NotFoundError::new(format!("key {key_id} is pending deletion"))
                .with_last_request(key_id),
        ));
    }
    Ok(key)
}

/// Read a key after create or during refresh
///
/// A new key may not be readable yet, so not found is retried for the
/// propagation timeout. For an existing key not found is returned at once
/// so the caller can drop it from state.
pub async fn find_key(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    is_new: bool,
) -> Result<KeyMetadata> {
    let key = retry_when_new_resource_not_found(
        settings.propagation.timeout,
        || find_key_by_id(api, key_id),
        is_new,
    )
    .await?;
    Ok(key)
}

pub async fn wait_key_enabled_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    enabled: bool,
) -> Result<KeyMetadata> {
    wait_propagated(
        settings,
        "enabled",
        KEY_STATE_PROPAGATION_TIMEOUT,
        || describe(api, key_id),
        |key: &KeyMetadata| Ok(key.enabled == enabled),
    )
    .await
}

pub async fn wait_key_description_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    description: &str,
) -> Result<KeyMetadata> {
    wait_propagated(
        settings,
        "description",
        KEY_DESCRIPTION_PROPAGATION_TIMEOUT,
        || describe(api, key_id),
        |key: &KeyMetadata| Ok(key.description == description),
    )
    .await
}

/// Wait until the key policy read back is equivalent to `policy`
///
/// An unparsable desired policy fails before the first read.
pub async fn wait_key_policy_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    policy: &str,
) -> Result<String> {
    normalize_policy(policy)?;

    wait_propagated(
        settings,
        "policy",
        KEY_POLICY_PROPAGATION_TIMEOUT,
        || async move { lift(api.get_key_policy(key_id).await, key_id) },
        |current: &String| {
            policies_are_equivalent(current, policy).map_err(|e| {
                WaitError::remote(ApiError::new("MalformedPolicyDocumentException", e.to_string()))
            })
        },
    )
    .await
}

pub async fn wait_key_rotation_enabled_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    enabled: bool,
) -> Result<bool> {
    wait_propagated(
        settings,
        "rotation",
        KEY_ROTATION_UPDATED_TIMEOUT,
        || async move { lift(api.get_key_rotation_status(key_id).await, key_id) },
        |current: &bool| Ok(*current == enabled),
    )
    .await
}

/// Wait until the key's user tags equal `tags`
///
/// Tags with the reserved `aws:` prefix are ignored on both sides.
pub async fn wait_key_tags_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    tags: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let desired = user_tags(tags);
    wait_propagated(
        settings,
        "tags",
        KEY_TAGS_PROPAGATION_TIMEOUT,
        || async move { lift(api.list_resource_tags(key_id).await, key_id) },
        |current: &BTreeMap<String, String>| Ok(user_tags(current) == desired),
    )
    .await
}

fn user_tags(tags: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    tags.iter()
        .filter(|(key, _)| !key.starts_with("aws:"))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

pub async fn wait_key_valid_to_propagated(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    valid_to: Option<DateTime<Utc>>,
) -> Result<KeyMetadata> {
    wait_propagated(
        settings,
        "valid_to",
        KEY_VALID_TO_PROPAGATION_TIMEOUT,
        || describe(api, key_id),
        |key: &KeyMetadata| Ok(key.valid_to == valid_to),
    )
    .await
}

/// Wait for a key's state to move from `pending` into `target`, bounded by
/// the update timeout
pub async fn wait_key_state(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    pending: &[KeyState],
    target: &[KeyState],
) -> Result<KeyMetadata> {
    let spec = settings
        .wait_spec(Operation::Update)
        .pending(pending.iter().map(KeyState::as_str))
        .target(target.iter().map(KeyState::as_str))
        .min_poll_interval(settings.propagation.min_poll_interval);

    let key = wait_for_state(spec, || async move {
        let key = describe(api, key_id).await?;
        let state = key.key_state;
        Ok::<_, WaitError<ApiError>>(Observation::new(key, state.as_str()))
    })
    .await?;
    Ok(key)
}

/// Wait for a scheduled deletion to show up
///
/// Done once the key reads as `PendingDeletion` or is not found at all.
/// Bounded by the delete timeout. Returns the last metadata seen, or
/// `None` when the key is gone.
pub async fn wait_key_deleted(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
) -> Result<Option<KeyMetadata>> {
    let spec = settings
        .wait_spec(Operation::Delete)
        .pending([KeyState::Enabled.as_str(), KeyState::Disabled.as_str()])
        .target([KeyState::PendingDeletion.as_str()]);

    let key = ConvergenceWaiter::new(spec)
        .wait_gone(|| async move {
            let key = describe(api, key_id).await?;
            let state = key.key_state;
            Ok::<_, WaitError<ApiError>>(Observation::new(key, state.as_str()))
        })
        .await?;
    Ok(key)
}
