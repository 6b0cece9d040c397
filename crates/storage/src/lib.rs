//! Persistence for graphsearch
//!
//! - [`PromptCache`]: the idempotency cache of answered queries, keyed by
//!   `(query text, node set, graph)`, with Postgres and in-memory backends
//! - [`GraphDataSource`]: read access to the precomputed entity and community
//!   report tables of each graph

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod error;
mod factory;
mod graph_data;
mod memory;
mod postgres;

pub use error::StorageError;
pub use factory::create_prompt_cache;
pub use graph_data::{JsonGraphDataSource, COMMUNITY_REPORTS_FILE, ENTITIES_FILE};
pub use memory::InMemoryPromptCache;
pub use postgres::PostgresPromptCache;

use async_trait::async_trait;
use graphsearch_core::error::Result;
use graphsearch_core::models::{GraphTables, NodeSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==== Traits ====

/// Store of previously answered queries.
///
/// Several records may share a query text and graph; they differ by node set.
/// Records are only ever appended.
#[async_trait]
pub trait PromptCache: Send + Sync {
    /// Newest stored response whose node set equals `nodes`
    async fn lookup(&self, query_text: &str, nodes: &NodeSet, graph_id: &str)
        -> Result<Option<String>>;

    /// Append one record atomically
    async fn store(
        &self,
        query_text: &str,
        response: &str,
        nodes: &NodeSet,
        graph_id: &str,
    ) -> Result<()>;

    /// Prompts asked against a graph, newest first
    async fn history(&self, graph_id: &str) -> Result<Vec<PromptHistoryEntry>>;
}

/// Provider of a graph's materialized tables
#[async_trait]
pub trait GraphDataSource: Send + Sync {
    async fn load(&self, graph_id: &str) -> Result<Arc<GraphTables>>;
}

// ==== Models ====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptHistoryEntry {
    pub prompt: String,
    pub nodes: NodeSet,
}
