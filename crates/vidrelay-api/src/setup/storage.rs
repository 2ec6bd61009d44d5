//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use vidrelay_core::Config;
use vidrelay_storage::{create_chunk_storage, create_storage, Storage};

/// Persistent store plus the local chunk namespace.
pub async fn setup_storage(config: &Config) -> Result<(Arc<dyn Storage>, Arc<dyn Storage>)> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize persistent storage")?;
    let chunk_storage = create_chunk_storage(config)
        .await
        .context("Failed to initialize chunk storage")?;

    tracing::info!(
        backend = ?storage.backend_type(),
        chunk_path = %config.upload().chunk_storage_path.display(),
        "Storage initialized successfully"
    );

    Ok((storage, chunk_storage))
}
