//! Shared data model for the global search pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One row of the per-graph entity table produced by the indexing pipeline.
///
/// The table holds one row per (entity, hierarchy level) pair, so the same title
/// can appear several times with different `community`/`level` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub title: String,
    /// Community the entity belongs to at `level`, absent for unclustered entities
    #[serde(default)]
    pub community: Option<i64>,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub degree: u32,
    #[serde(default)]
    pub text_unit_ids: Vec<String>,
}

/// Precomputed natural-language summary of one community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    pub community: i64,
    pub level: u32,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub full_content: String,
    #[serde(default)]
    pub rank: f64,
}

/// Materialized tables for a single graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphTables {
    pub entities: Vec<EntityRecord>,
    pub reports: Vec<CommunityReport>,
}

/// A packed block of report rows sent to one map call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    pub token_count: usize,
}

/// A scored answer fragment produced by one map call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub source_chunk_index: usize,
    pub answer: String,
    pub score: i64,
}

impl KeyPoint {
    /// Placeholder emitted for a chunk whose reply was unusable
    pub fn placeholder(source_chunk_index: usize) -> Self {
        Self {
            source_chunk_index,
            answer: String::new(),
            score: 0,
        }
    }
}

/// One alternative in a structured completion reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub output: String,
}

/// Raw completion output as returned by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LlmOutput {
    Text(String),
    Structured(Vec<Alternative>),
}

impl LlmOutput {
    /// Resolve to a single string; structured replies use their first alternative
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(alternatives) => alternatives
                .into_iter()
                .next()
                .map(|alt| alt.output)
                .unwrap_or_default(),
        }
    }
}

/// Unordered set of selected node ids used as part of the cache key.
///
/// `None` and the empty set are the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSet(BTreeSet<String>);

impl NodeSet {
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(nodes.into_iter().map(Into::into).collect())
    }

    pub fn from_optional(nodes: Option<&[String]>) -> Self {
        nodes.map(|n| Self::new(n.iter().cloned())).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.0.contains(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Sorted node ids
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for NodeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_set_ignores_order_and_duplicates() {
        let a = NodeSet::new(["a", "b"]);
        let b = NodeSet::new(["b", "a", "b"]);
        assert_eq!(a, b);
        assert_eq!(b.to_vec(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_node_set_none_equals_empty() {
        assert_eq!(NodeSet::from_optional(None), NodeSet::default());
        assert_eq!(NodeSet::from_optional(Some(&[])), NodeSet::default());
        assert_ne!(NodeSet::default(), NodeSet::new(["x"]));
    }

    #[test]
    fn test_llm_output_resolution() {
        assert_eq!(LlmOutput::Text("hi".into()).into_text(), "hi");
        let structured = LlmOutput::Structured(vec![
            Alternative {
                output: "first".into(),
            },
            Alternative {
                output: "second".into(),
            },
        ]);
        assert_eq!(structured.into_text(), "first");
        assert_eq!(LlmOutput::Structured(vec![]).into_text(), "");
    }

    #[test]
    fn test_entity_record_defaults() {
        let record: EntityRecord =
            serde_json::from_str(r#"{"id": "e1", "title": "X"}"#).expect("valid entity json");
        assert_eq!(record.community, None);
        assert_eq!(record.level, 0);
        assert!(record.text_unit_ids.is_empty());
    }
}
