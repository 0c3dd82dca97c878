//! Grant creation and revocation waits

use crate::api::{CreateGrantInput, Grant, GrantListEntry, KeyManagementApi, lift, lift_optional};
use crate::error::Result;
use crate::wait::iam_propagation_classifier;
use cloudwait::{RetryLoop, retry_until_not_found, retry_when_not_found};
use cloudwait_config::WaitSettings;
use std::time::Duration;

pub const GRANT_CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const GRANT_DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Create a grant, retrying while the grantee principal propagates
///
/// Attempts back off as configured under `retry`.
pub async fn create_grant(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    input: &CreateGrantInput,
    timeout: Duration,
) -> Result<Grant> {
    let grant = RetryLoop::new(timeout, iam_propagation_classifier())
        .backoff(settings.backoff())
        .run_notify(
            || async move { lift(api.create_grant(input).await, &input.key_id) },
            |attempt, err, delay| {
                tracing::debug!(attempt, %err, ?delay, key_id = %input.key_id, "grant creation retrying");
            },
        )
        .await?;
    Ok(grant)
}

async fn find_grant(
    api: &dyn KeyManagementApi,
    key_id: &str,
    grant_id: &str,
) -> cloudwait::Result<GrantListEntry> {
    lift_optional(api.find_grant(key_id, grant_id).await, (key_id, grant_id))
}

/// Read a grant that was just created, waiting for it to become visible
pub async fn find_grant_with_retry(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    key_id: &str,
    grant_id: &str,
) -> Result<GrantListEntry> {
    let grant = retry_when_not_found(settings.propagation.timeout, || {
        find_grant(api, key_id, grant_id)
    })
    .await?;
    Ok(grant)
}

/// Wait until a revoked grant no longer shows up in the key's grant list
pub async fn wait_grant_revoked(api: &dyn KeyManagementApi, key_id: &str, grant_id: &str) -> Result<()> {
    retry_until_not_found(GRANT_DELETE_TIMEOUT, || find_grant(api, key_id, grant_id)).await?;
    tracing::debug!(key_id, grant_id, "grant revoked");
    Ok(())
}
