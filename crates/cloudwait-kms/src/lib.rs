//! Key management waiters built on cloudwait
//!
//! Adapters that turn the service's eventually-consistent key, key store
//! and grant reads into dependable waits. The service itself sits behind
//! [`KeyManagementApi`], so any SDK client (or a test double) can drive
//! them.
//!
//! # Example
//!
//! ```ignore
//! use cloudwait_kms::{find_key, wait_key_policy_propagated};
//!
//! let settings = cloudwait_config::load()?;
//! client.put_key_policy(&key_id, &policy).await?;
//! wait_key_policy_propagated(&client, &settings, &key_id, &policy).await?;
//!
//! let key = find_key(&client, &settings, &key_id, false).await?;
//! ```

pub mod api;
pub mod custom_key_store;
pub mod error;
pub mod grant;
pub mod policy;
pub mod wait;

pub use api::{
    ApiResult, ConnectionState, CreateGrantInput, CustomKeyStore, Grant, GrantListEntry,
    KeyManagementApi, KeyMetadata, KeyState, NOT_FOUND_CODE,
};
pub use custom_key_store::{
    CUSTOM_KEY_STORE_GATE, connect_custom_key_store, disconnect_custom_key_store,
    wait_custom_key_store_connected, wait_custom_key_store_disconnected,
};
pub use error::{KmsError, Result};
pub use grant::{create_grant, find_grant_with_retry, wait_grant_revoked};
pub use policy::policies_are_equivalent;
pub use wait::*;
