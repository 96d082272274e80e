use crate::core::cache::CacheStore;
use anyhow::{Context, Result};

/// Drops every cached rate from the selected backend.
pub async fn clear(store: &dyn CacheStore) -> Result<()> {
    store
        .clear()
        .await
        .with_context(|| format!("Failed to clear the {} cache", store.name()))?;
    println!("Cleared the {} cache", store.name());
    Ok(())
}
