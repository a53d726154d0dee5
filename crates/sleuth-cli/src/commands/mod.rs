//! CLI command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use sleuth_core::config::ClientConfig;
use sleuth_core::session::{SessionStore, storage_from_config};
use sleuth_core::transport::ReqwestTransport;

pub mod auth;
pub mod cases;
pub mod submissions;
pub mod submit;

/// Builds a session store from config. Loads any stored token but makes no
/// network call.
pub fn build_store(config: &ClientConfig) -> Result<SessionStore> {
    let transport = ReqwestTransport::new(config.request_timeout())
        .context("failed to initialize HTTP client")?;
    Ok(SessionStore::new(
        config,
        Arc::new(transport),
        storage_from_config(&config.storage),
    ))
}

/// [`build_store`], then confirms the stored token with the backend.
pub async fn open_store(config: &ClientConfig) -> Result<SessionStore> {
    let store = build_store(config)?;
    if let Err(error) = store.restore().await {
        tracing::warn!(error = %error, "stored session could not be restored");
    }
    Ok(store)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}
