//! Request and response models for global search

use graphsearch_core::error::{Error, Result};
use graphsearch_core::models::{KeyPoint, NodeSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_QUERY_LENGTH: usize = 10000;

/// A question asked against one graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub text: String,
    pub graph_id: String,
    /// Entity titles restricting which communities are consulted
    #[serde(default)]
    pub entity_subset: Option<Vec<String>>,
    /// Language the answer should be written in
    #[serde(default)]
    pub language: Option<String>,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>, graph_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            graph_id: graph_id.into(),
            entity_subset: None,
            language: None,
        }
    }

    pub fn with_entity_subset<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_subset = Some(nodes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Validate the request, checking query constraints
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(Error::invalid_request("Query cannot be empty"));
        }
        if self.text.chars().count() > MAX_QUERY_LENGTH {
            return Err(Error::invalid_request(format!(
                "Query exceeds maximum length of {MAX_QUERY_LENGTH} characters"
            )));
        }
        if self.graph_id.trim().is_empty() {
            return Err(Error::invalid_request("Graph id cannot be empty"));
        }
        Ok(())
    }

    /// Normalized entity subset used for context selection and as part of the cache key
    pub fn node_set(&self) -> NodeSet {
        NodeSet::from_optional(self.entity_subset.as_deref())
    }
}

/// Answer returned to front ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub response_text: String,
    pub cache_hit: bool,
}

/// Outcome of one map call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapResponse {
    pub chunk_index: usize,
    pub points: Vec<KeyPoint>,
    /// Tokens of the rendered map prompt, query excluded
    pub prompt_tokens: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub map_prompt: usize,
    pub reduce_prompt: usize,
    pub reduce_context: usize,
}

/// Full trace of a computed (non-cached) answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub response: String,
    pub map_responses: Vec<MapResponse>,
    pub token_counts: TokenCounts,
    pub elapsed: Duration,
    /// Invocations issued for this query: one per chunk plus the reduce call
    pub llm_call_count: usize,
    pub context_chunk_count: usize,
}
