//! Tabular graph data loaded from per-graph JSON files

use crate::error::StorageError;
use crate::GraphDataSource;
use async_trait::async_trait;
use graphsearch_core::config::GraphConfig;
use graphsearch_core::error::Result;
use graphsearch_core::models::{CommunityReport, EntityRecord, GraphTables};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const ENTITIES_FILE: &str = "entities.json";
pub const COMMUNITY_REPORTS_FILE: &str = "community_reports.json";

/// Reads `entities.json` and `community_reports.json` from each graph's data directory.
///
/// Tables are parsed once per graph and kept for the life of the source.
pub struct JsonGraphDataSource {
    graph_dirs: BTreeMap<String, PathBuf>,
    tables: Cache<String, Arc<GraphTables>>,
}

impl JsonGraphDataSource {
    pub fn new(graphs: &BTreeMap<String, GraphConfig>) -> Self {
        let graph_dirs = graphs
            .iter()
            .map(|(id, config)| (id.clone(), config.data_dir.clone()))
            .collect();
        Self {
            graph_dirs,
            tables: Cache::builder().max_capacity(64).build(),
        }
    }

    /// Source with a single graph rooted at `data_dir`
    pub fn single(graph_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let mut graphs = BTreeMap::new();
        graphs.insert(
            graph_id.into(),
            GraphConfig {
                data_dir: data_dir.into(),
                community_level: None,
            },
        );
        Self::new(&graphs)
    }

    async fn read_tables(dir: &Path) -> std::result::Result<GraphTables, StorageError> {
        let entities: Vec<EntityRecord> = read_table(&dir.join(ENTITIES_FILE)).await?;
        let reports: Vec<CommunityReport> = read_table(&dir.join(COMMUNITY_REPORTS_FILE)).await?;
        Ok(GraphTables { entities, reports })
    }
}

async fn read_table<T: DeserializeOwned>(path: &Path) -> std::result::Result<Vec<T>, StorageError> {
    let unreadable = |message: String| StorageError::TableUnreadable {
        path: path.display().to_string(),
        message,
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| unreadable(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))
}

#[async_trait]
impl GraphDataSource for JsonGraphDataSource {
    async fn load(&self, graph_id: &str) -> Result<Arc<GraphTables>> {
        if let Some(tables) = self.tables.get(graph_id).await {
            return Ok(tables);
        }

        let dir = self
            .graph_dirs
            .get(graph_id)
            .ok_or_else(|| StorageError::UnknownGraph(graph_id.to_string()))?;

        debug!("Loading graph tables for '{graph_id}' from {}", dir.display());
        let tables = Arc::new(Self::read_tables(dir).await?);
        info!(
            "Loaded graph '{graph_id}': {} entities, {} community reports",
            tables.entities.len(),
            tables.reports.len()
        );

        self.tables
            .insert(graph_id.to_string(), Arc::clone(&tables))
            .await;
        Ok(tables)
    }
}
