use crate::error::StorageError;
use crate::{PromptCache, PromptHistoryEntry};
use async_trait::async_trait;
use graphsearch_core::config::StorageConfig;
use graphsearch_core::error::Result;
use graphsearch_core::models::NodeSet;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

/// Idempotency cache backed by the `prompt_histories` / `prompt_selected_nodes` tables
pub struct PostgresPromptCache {
    pool: PgPool,
}

impl PostgresPromptCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the storage section of the configuration
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        info!(
            "Connecting to Postgres at {}:{}/{}",
            config.postgres_host, config.postgres_port, config.postgres_database
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres_pool_size)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.postgres_url())
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        info!("Prompt cache migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PromptCache for PostgresPromptCache {
    async fn lookup(&self, query_text: &str, nodes: &NodeSet, graph_id: &str) -> Result<Option<String>> {
        let rows: Vec<(i64, String, Vec<String>)> = sqlx::query_as(
            "SELECT ph.id, ph.response,
                    COALESCE(array_agg(psn.node) FILTER (WHERE psn.node IS NOT NULL), '{}'::text[])
             FROM prompt_histories ph
             LEFT JOIN prompt_selected_nodes psn ON psn.prompt_id = ph.id
             WHERE md5(ph.prompt) = md5($1) AND ph.prompt = $1 AND ph.graph = $2
             GROUP BY ph.id, ph.response
             ORDER BY ph.id DESC",
        )
        .bind(query_text)
        .bind(graph_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to look up prompt: {e}")))?;

        debug!("Prompt lookup found {} candidate rows", rows.len());

        Ok(rows
            .into_iter()
            .find(|(_, _, stored)| NodeSet::new(stored.iter().cloned()) == *nodes)
            .map(|(_, response, _)| response))
    }

    async fn store(
        &self,
        query_text: &str,
        response: &str,
        nodes: &NodeSet,
        graph_id: &str,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to begin transaction: {e}")))?;

        let prompt_id: i64 = sqlx::query_scalar(
            "INSERT INTO prompt_histories (prompt, response, graph)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(query_text)
        .bind(response)
        .bind(graph_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to insert prompt: {e}")))?;

        if !nodes.is_empty() {
            sqlx::query(
                "INSERT INTO prompt_selected_nodes (prompt_id, node)
                 SELECT $1, node FROM UNNEST($2::text[]) AS node",
            )
            .bind(prompt_id)
            .bind(nodes.to_vec())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                StorageError::QueryFailed(format!("Failed to insert selected nodes: {e}"))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("Failed to commit transaction: {e}")))?;

        debug!(prompt_id, nodes = nodes.len(), "Stored prompt response");
        Ok(())
    }

    async fn history(&self, graph_id: &str) -> Result<Vec<PromptHistoryEntry>> {
        let rows: Vec<(String, Vec<String>)> = sqlx::query_as(
            "SELECT ph.prompt,
                    COALESCE(array_agg(psn.node ORDER BY psn.node) FILTER (WHERE psn.node IS NOT NULL), '{}'::text[])
             FROM prompt_histories ph
             LEFT JOIN prompt_selected_nodes psn ON psn.prompt_id = ph.id
             WHERE ph.graph = $1
             GROUP BY ph.id, ph.prompt
             ORDER BY ph.id DESC",
        )
        .bind(graph_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(format!("Failed to load prompt history: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(prompt, nodes)| PromptHistoryEntry {
                prompt,
                nodes: NodeSet::new(nodes),
            })
            .collect())
    }
}
