//! In-memory prompt cache for tests and single-process deployments

use crate::{PromptCache, PromptHistoryEntry};
use async_trait::async_trait;
use graphsearch_core::error::{Error, Result};
use graphsearch_core::models::NodeSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct StoredPrompt {
    id: u64,
    prompt: String,
    response: String,
    nodes: NodeSet,
    graph: String,
}

#[derive(Debug, Default)]
struct CacheData {
    next_id: u64,
    records: Vec<StoredPrompt>,
}

/// Process-local [`PromptCache`]; records are appended with increasing ids
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromptCache {
    data: Arc<Mutex<CacheData>>,
}

impl InMemoryPromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all graphs
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CacheData>> {
        self.data
            .lock()
            .map_err(|e| Error::cache_unavailable(format!("In-memory cache poisoned: {e}")))
    }
}

#[async_trait]
impl PromptCache for InMemoryPromptCache {
    async fn lookup(&self, query_text: &str, nodes: &NodeSet, graph_id: &str) -> Result<Option<String>> {
        let data = self.lock()?;
        Ok(data
            .records
            .iter()
            .rev()
            .find(|r| r.prompt == query_text && r.graph == graph_id && r.nodes == *nodes)
            .map(|r| r.response.clone()))
    }

    async fn store(
        &self,
        query_text: &str,
        response: &str,
        nodes: &NodeSet,
        graph_id: &str,
    ) -> Result<()> {
        let mut data = self.lock()?;
        data.next_id += 1;
        let id = data.next_id;
        data.records.push(StoredPrompt {
            id,
            prompt: query_text.to_string(),
            response: response.to_string(),
            nodes: nodes.clone(),
            graph: graph_id.to_string(),
        });
        Ok(())
    }

    async fn history(&self, graph_id: &str) -> Result<Vec<PromptHistoryEntry>> {
        let data = self.lock()?;
        let mut entries: Vec<&StoredPrompt> =
            data.records.iter().filter(|r| r.graph == graph_id).collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries
            .into_iter()
            .map(|r| PromptHistoryEntry {
                prompt: r.prompt.clone(),
                nodes: r.nodes.clone(),
            })
            .collect())
    }
}
