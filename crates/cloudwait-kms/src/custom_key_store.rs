//! Custom key store connection waits
//!
//! Connecting a key store ties up the backing cluster, so connects and
//! disconnects go through a named concurrency gate.

use crate::api::{ConnectionState, CustomKeyStore, KeyManagementApi, lift};
use crate::error::{KmsError, Result};
use cloudwait::{ApiError, Observation, SemaphoreRegistry, WaitError, WaitSpec, wait_for_state};
use cloudwait_config::WaitSettings;
use std::time::Duration;

/// Name of the gate shared by connect and disconnect calls
pub const CUSTOM_KEY_STORE_GATE: &str = "custom-key-store";

/// Connects allowed at once when no capacity is configured
pub const DEFAULT_CONNECT_CONCURRENCY: usize = 1;

async fn wait_connection_state(
    api: &dyn KeyManagementApi,
    store_id: &str,
    pending: ConnectionState,
    target: ConnectionState,
    timeout: Duration,
) -> Result<CustomKeyStore> {
    // Anything else, FAILED included, is an unexpected state.
    let spec = WaitSpec::new(timeout)
        .pending([pending.as_str()])
        .target([target.as_str()]);

    let store = wait_for_state(spec, || async move {
        let store = lift(api.describe_custom_key_store(store_id).await, store_id)?;
        let state = store.connection_state;
        if state == ConnectionState::Failed {
            tracing::debug!(
                store_id,
                error_code = ?store.connection_error_code,
                "custom key store connection failed"
            );
        }
        Ok::<_, WaitError<ApiError>>(Observation::new(store, state.as_str()))
    })
    .await?;
    Ok(store)
}

pub async fn wait_custom_key_store_connected(
    api: &dyn KeyManagementApi,
    store_id: &str,
    timeout: Duration,
) -> Result<CustomKeyStore> {
    wait_connection_state(
        api,
        store_id,
        ConnectionState::Connecting,
        ConnectionState::Connected,
        timeout,
    )
    .await
}

pub async fn wait_custom_key_store_disconnected(
    api: &dyn KeyManagementApi,
    store_id: &str,
    timeout: Duration,
) -> Result<CustomKeyStore> {
    wait_connection_state(
        api,
        store_id,
        ConnectionState::Disconnecting,
        ConnectionState::Disconnected,
        timeout,
    )
    .await
}

/// Connect a key store and wait for `CONNECTED`, holding a gate permit
/// for the whole operation
pub async fn connect_custom_key_store(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    gates: &SemaphoreRegistry,
    store_id: &str,
    timeout: Duration,
) -> Result<CustomKeyStore> {
    let gate = settings.gate(gates, CUSTOM_KEY_STORE_GATE, DEFAULT_CONNECT_CONCURRENCY);
    let _permit = gate
        .acquire()
        .await
        .map_err(|_| KmsError::GateClosed(CUSTOM_KEY_STORE_GATE.to_string()))?;

    tracing::info!(store_id, "connecting custom key store");
    lift(api.connect_custom_key_store(store_id).await, store_id)?;
    wait_custom_key_store_connected(api, store_id, timeout).await
}

/// Disconnect a key store and wait for `DISCONNECTED`
pub async fn disconnect_custom_key_store(
    api: &dyn KeyManagementApi,
    settings: &WaitSettings,
    gates: &SemaphoreRegistry,
    store_id: &str,
    timeout: Duration,
) -> Result<CustomKeyStore> {
    let gate = settings.gate(gates, CUSTOM_KEY_STORE_GATE, DEFAULT_CONNECT_CONCURRENCY);
    let _permit = gate
        .acquire()
        .await
        .map_err(|_| KmsError::GateClosed(CUSTOM_KEY_STORE_GATE.to_string()))?;

    tracing::info!(store_id, "disconnecting custom key store");
    lift(api.disconnect_custom_key_store(store_id).await, store_id)?;
    wait_custom_key_store_disconnected(api, store_id, timeout).await
}
