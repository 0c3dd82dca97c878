//! Narrow key management client and the models it returns

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudwait::{ApiError, NotFoundError, WaitError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Service error code for a missing key, grant or key store
pub const NOT_FOUND_CODE: &str = "NotFoundException";

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Key lifecycle state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Creating,
    Enabled,
    Disabled,
    PendingDeletion,
    PendingImport,
    PendingReplicaDeletion,
    Unavailable,
    Updating,
}

impl KeyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyState::Creating => "Creating",
            KeyState::Enabled => "Enabled",
            KeyState::Disabled => "Disabled",
            KeyState::PendingDeletion => "PendingDeletion",
            KeyState::PendingImport => "PendingImport",
            KeyState::PendingReplicaDeletion => "PendingReplicaDeletion",
            KeyState::Unavailable => "Unavailable",
            KeyState::Updating => "Updating",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyMetadata {
    pub key_id: String,
    pub arn: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub key_state: KeyState,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    /// Expiry of imported key material
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
}

/// Connection state of a custom key store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connected,
    Connecting,
    Disconnected,
    Disconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Disconnecting => "DISCONNECTING",
            ConnectionState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomKeyStore {
    pub custom_key_store_id: String,
    pub custom_key_store_name: String,
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub connection_error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGrantInput {
    pub key_id: String,
    pub grantee_principal: String,
    pub operations: Vec<String>,
    #[serde(default)]
    pub retiring_principal: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Grant {
    pub grant_id: String,
    pub grant_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrantListEntry {
    pub key_id: String,
    pub grant_id: String,
    pub grantee_principal: String,
    pub operations: Vec<String>,
}

/// The key management calls the waiters need
///
/// Implementations report a missing object with an error whose code is
/// [`NOT_FOUND_CODE`]; `find_grant` reports a missing grant with `Ok(None)`.
#[async_trait]
pub trait KeyManagementApi: Send + Sync {
    async fn describe_key(&self, key_id: &str) -> ApiResult<KeyMetadata>;

    async fn get_key_policy(&self, key_id: &str) -> ApiResult<String>;

    async fn get_key_rotation_status(&self, key_id: &str) -> ApiResult<bool>;

    async fn list_resource_tags(&self, key_id: &str) -> ApiResult<BTreeMap<String, String>>;

    async fn describe_custom_key_store(&self, store_id: &str) -> ApiResult<CustomKeyStore>;

    async fn connect_custom_key_store(&self, store_id: &str) -> ApiResult<()>;

    async fn disconnect_custom_key_store(&self, store_id: &str) -> ApiResult<()>;

    async fn create_grant(&self, input: &CreateGrantInput) -> ApiResult<Grant>;

    async fn find_grant(&self, key_id: &str, grant_id: &str) -> ApiResult<Option<GrantListEntry>>;
}

/// Turn a client result into an engine result, mapping the service's
/// not-found code to `WaitError::NotFound`
pub(crate) fn lift<T>(result: ApiResult<T>, request: impl fmt::Debug) -> cloudwait::Result<T> {
    result.map_err(|err| {
        if err.code == NOT_FOUND_CODE {
            WaitError::NotFound(NotFoundError::new(err.message).with_last_request(request))
        } else {
            WaitError::remote(err)
        }
    })
}

/// Like [`lift`], for lookups that report absence as `None`
pub(crate) fn lift_optional<T>(
    result: ApiResult<Option<T>>,
    request: impl fmt::Debug + Clone,
) -> cloudwait::Result<T> {
    match lift(result, request.clone())? {
        Some(value) => Ok(value),
        None => Err(WaitError::NotFound(
            NotFoundError::new("empty result").with_last_request(request),
        )),
    }
}
