use crate::memory::InMemoryPromptCache;
use crate::postgres::PostgresPromptCache;
use crate::PromptCache;
use graphsearch_core::{config::StorageConfig, Error};
use std::sync::Arc;
use tracing::info;

/// Creates the idempotency cache selected by `storage.provider`.
///
/// For Postgres the connection is established and migrations are applied before
/// the cache is returned.
///
/// # Errors
/// Returns `CacheUnavailable` when Postgres cannot be reached or migrated, and a
/// configuration error for unknown providers.
pub async fn create_prompt_cache(config: &StorageConfig) -> Result<Arc<dyn PromptCache>, Error> {
    match config.provider.as_str() {
        "postgres" => {
            let cache = PostgresPromptCache::connect(config).await?;
            cache.run_migrations().await?;
            Ok(Arc::new(cache) as Arc<dyn PromptCache>)
        }
        "memory" => {
            info!("Using in-memory prompt cache; records are lost on exit");
            Ok(Arc::new(InMemoryPromptCache::new()) as Arc<dyn PromptCache>)
        }
        other => Err(Error::config(format!(
            "Unknown storage provider: '{other}'. Valid providers: postgres, memory"
        ))),
    }
}
