//! Context builder: selects community reports and packs them into token-bounded chunks

use graphsearch_core::config::SearchConfig;
use graphsearch_core::error::Result;
use graphsearch_core::models::{CommunityReport, ContextChunk, EntityRecord, NodeSet};
use graphsearch_core::tokenizer::TokenCounter;
use graphsearch_storage::GraphDataSource;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

const CONTEXT_NAME: &str = "Reports";

/// Which part of which graph a query consults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope {
    pub graph_id: String,
    pub entity_subset: NodeSet,
}

/// Knobs copied from [`SearchConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSettings {
    pub shuffle_data: bool,
    pub random_seed: u64,
    pub use_community_summary: bool,
    pub include_community_rank: bool,
    pub include_community_weight: bool,
    pub normalize_community_weight: bool,
    pub min_community_rank: f64,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for ContextSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            shuffle_data: config.shuffle_data,
            random_seed: config.random_seed,
            use_community_summary: config.use_community_summary,
            include_community_rank: config.include_community_rank,
            include_community_weight: config.include_community_weight,
            normalize_community_weight: config.normalize_community_weight,
            min_community_rank: config.min_community_rank,
        }
    }
}

/// One selected report as it appears in the context tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub community: i64,
    pub title: String,
    pub occurrence_weight: f64,
    pub content: String,
    pub rank: f64,
}

/// Builds the map-stage context for a query. Performs no network I/O.
pub struct ContextBuilder {
    data_source: Arc<dyn GraphDataSource>,
    tokenizer: Arc<dyn TokenCounter>,
    settings: ContextSettings,
}

impl ContextBuilder {
    pub fn new(
        data_source: Arc<dyn GraphDataSource>,
        tokenizer: Arc<dyn TokenCounter>,
        settings: ContextSettings,
    ) -> Self {
        Self {
            data_source,
            tokenizer,
            settings,
        }
    }

    /// Select reports for `scope` and pack them into chunks of at most `max_tokens`.
    ///
    /// Returns the chunks in insertion order together with every report record
    /// that made it into a chunk.
    pub async fn build(
        &self,
        scope: &SearchScope,
        community_level: u32,
        max_tokens: usize,
    ) -> Result<(Vec<ContextChunk>, Vec<ReportRecord>)> {
        let tables = self.data_source.load(&scope.graph_id).await?;

        let mut records = select_reports(
            &tables.entities,
            &tables.reports,
            &scope.entity_subset,
            community_level,
            &self.settings,
        );
        debug!(
            graph = %scope.graph_id,
            community_level,
            "Selected {} community reports",
            records.len()
        );

        if self.settings.shuffle_data {
            let mut rng = StdRng::seed_from_u64(self.settings.random_seed);
            records.shuffle(&mut rng);
        }

        Ok(self.pack(records, max_tokens))
    }

    fn header(&self) -> String {
        let mut columns = vec!["id", "title"];
        if self.settings.include_community_weight {
            columns.push("occurrence weight");
        }
        columns.push("content");
        if self.settings.include_community_rank {
            columns.push("rank");
        }
        format!("-----{CONTEXT_NAME}-----\n{}\n", columns.join("|"))
    }

    fn row(&self, record: &ReportRecord) -> String {
        let mut fields = vec![record.community.to_string(), record.title.clone()];
        if self.settings.include_community_weight {
            fields.push(record.occurrence_weight.to_string());
        }
        fields.push(record.content.clone());
        if self.settings.include_community_rank {
            fields.push(record.rank.to_string());
        }
        format!("{}\n", fields.join("|"))
    }

    fn pack(
        &self,
        records: Vec<ReportRecord>,
        max_tokens: usize,
    ) -> (Vec<ContextChunk>, Vec<ReportRecord>) {
        let header = self.header();
        let header_tokens = self.tokenizer.count(&header);

        let mut chunks = Vec::new();
        let mut included = Vec::new();
        let mut current: Vec<(ReportRecord, String)> = Vec::new();
        let mut current_tokens = header_tokens;

        for record in records {
            let row = self.row(&record);
            let row_tokens = self.tokenizer.count(&row);

            if current_tokens + row_tokens > max_tokens && !current.is_empty() {
                chunks.push(self.finish_chunk(&header, std::mem::take(&mut current)));
                current_tokens = header_tokens;
            }

            if header_tokens + row_tokens > max_tokens {
                warn!(
                    "Dropping report for community {} ({row_tokens} tokens) exceeding context budget of {max_tokens}",
                    record.community
                );
                continue;
            }

            current_tokens += row_tokens;
            included.push(record.clone());
            current.push((record, row));
        }

        if !current.is_empty() {
            chunks.push(self.finish_chunk(&header, current));
        }

        debug!(
            "Packed {} reports into {} context chunks",
            included.len(),
            chunks.len()
        );
        (chunks, included)
    }

    fn finish_chunk(&self, header: &str, mut rows: Vec<(ReportRecord, String)>) -> ContextChunk {
        // Stable: ties keep shuffled order
        rows.sort_by(|(a, _), (b, _)| {
            b.occurrence_weight
                .total_cmp(&a.occurrence_weight)
                .then_with(|| b.rank.total_cmp(&a.rank))
        });

        let mut text = header.to_string();
        for (_, row) in &rows {
            text.push_str(row);
        }
        let token_count = self.tokenizer.count(&text);
        ContextChunk { text, token_count }
    }
}

/// Pick the reports reachable from the (optionally filtered) entities at `community_level`
fn select_reports(
    entities: &[EntityRecord],
    reports: &[CommunityReport],
    entity_subset: &NodeSet,
    community_level: u32,
    settings: &ContextSettings,
) -> Vec<ReportRecord> {
    // Deepest community at or below the level, per entity
    let mut deepest: HashMap<&str, &EntityRecord> = HashMap::new();
    for entity in entities {
        if !entity_subset.is_empty() && !entity_subset.contains(&entity.title) {
            continue;
        }
        if entity.community.is_none() || entity.level > community_level {
            continue;
        }
        deepest
            .entry(entity.id.as_str())
            .and_modify(|current| {
                if entity.level > current.level {
                    *current = entity;
                }
            })
            .or_insert(entity);
    }

    let mut text_units: BTreeMap<i64, BTreeSet<&str>> = BTreeMap::new();
    for entity in deepest.values() {
        if let Some(community) = entity.community {
            let units = text_units.entry(community).or_default();
            units.extend(entity.text_unit_ids.iter().map(String::as_str));
        }
    }

    let mut selected: Vec<&CommunityReport> = reports
        .iter()
        .filter(|r| {
            text_units.contains_key(&r.community)
                && r.level <= community_level
                && r.rank >= settings.min_community_rank
        })
        .collect();
    selected.sort_by_key(|r| r.community);

    let max_weight = selected
        .iter()
        .map(|r| text_units.get(&r.community).map_or(0, BTreeSet::len))
        .max()
        .unwrap_or(0);

    selected
        .into_iter()
        .map(|report| {
            let weight = text_units.get(&report.community).map_or(0, BTreeSet::len) as f64;
            let occurrence_weight = if settings.normalize_community_weight && max_weight > 0 {
                weight / max_weight as f64
            } else {
                weight
            };
            let content = if settings.use_community_summary {
                report.summary.clone()
            } else {
                report.full_content.clone()
            };
            ReportRecord {
                community: report.community,
                title: report.title.clone(),
                occurrence_weight,
                content,
                rank: report.rank,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphsearch_core::models::GraphTables;
    use graphsearch_core::tokenizer::WordTokenCounter;

    struct StaticSource(Arc<GraphTables>);

    #[async_trait]
    impl GraphDataSource for StaticSource {
        async fn load(&self, _graph_id: &str) -> Result<Arc<GraphTables>> {
            Ok(Arc::clone(&self.0))
        }
    }

    fn entity(id: &str, title: &str, community: i64, level: u32, units: &[&str]) -> EntityRecord {
        EntityRecord {
            id: id.to_string(),
            title: title.to_string(),
            community: Some(community),
            level,
            degree: 1,
            text_unit_ids: units.iter().map(|u| u.to_string()).collect(),
        }
    }

    fn report(community: i64, level: u32, rank: f64, content: &str) -> CommunityReport {
        CommunityReport {
            community,
            level,
            title: format!("Community {community}"),
            summary: format!("summary {community}"),
            full_content: content.to_string(),
            rank,
        }
    }

    fn tables() -> GraphTables {
        GraphTables {
            entities: vec![
                entity("e1", "X", 1, 0, &["t1", "t2"]),
                entity("e1", "X", 10, 1, &["t1", "t2"]),
                entity("e2", "Y", 2, 0, &["t3"]),
                entity("e3", "Z", 2, 0, &["t3", "t4"]),
                entity("e4", "W", 30, 3, &["t9"]),
            ],
            reports: vec![
                report(1, 0, 5.0, "community one"),
                report(10, 1, 8.0, "community ten"),
                report(2, 0, 3.0, "community two"),
                report(30, 3, 9.0, "community thirty"),
            ],
        }
    }

    fn builder(settings: ContextSettings) -> ContextBuilder {
        ContextBuilder::new(
            Arc::new(StaticSource(Arc::new(tables()))),
            Arc::new(WordTokenCounter::new()),
            settings,
        )
    }

    fn unshuffled() -> ContextSettings {
        ContextSettings {
            shuffle_data: false,
            ..ContextSettings::default()
        }
    }

    fn scope(subset: NodeSet) -> SearchScope {
        SearchScope {
            graph_id: "demo".to_string(),
            entity_subset: subset,
        }
    }

    #[test]
    fn test_selects_deepest_community_per_entity() {
        let t = tables();
        let records = select_reports(&t.entities, &t.reports, &NodeSet::default(), 1, &unshuffled());
        let communities: Vec<i64> = records.iter().map(|r| r.community).collect();
        // e1 moves to community 10 at level 1, so community 1 is no longer reachable
        assert_eq!(communities, vec![2, 10]);
    }

    #[test]
    fn test_level_zero_selection_and_weights() {
        let t = tables();
        let records = select_reports(&t.entities, &t.reports, &NodeSet::default(), 0, &unshuffled());
        assert_eq!(records.len(), 2);
        // community 1: {t1,t2}; community 2: {t3,t4}
        assert!(records.iter().all(|r| r.occurrence_weight == 1.0));
    }

    #[test]
    fn test_entity_subset_restricts_communities() {
        let t = tables();
        let records = select_reports(&t.entities, &t.reports, &NodeSet::new(["Y"]), 2, &unshuffled());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].community, 2);
        assert_eq!(records[0].occurrence_weight, 1.0);
    }

    #[test]
    fn test_min_rank_and_summary_content() {
        let t = tables();
        let settings = ContextSettings {
            min_community_rank: 4.0,
            use_community_summary: true,
            ..unshuffled()
        };
        let records = select_reports(&t.entities, &t.reports, &NodeSet::default(), 1, &settings);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].community, 10);
        assert_eq!(records[0].content, "summary 10");
    }

    #[test]
    fn test_unnormalized_weight_counts_distinct_text_units() {
        let t = tables();
        let settings = ContextSettings {
            normalize_community_weight: false,
            ..unshuffled()
        };
        let records = select_reports(&t.entities, &t.reports, &NodeSet::default(), 0, &settings);
        let two = records.iter().find(|r| r.community == 2).expect("community 2");
        assert_eq!(two.occurrence_weight, 2.0);
    }

    #[tokio::test]
    async fn test_single_chunk_layout() {
        let (chunks, records) = builder(unshuffled())
            .build(&scope(NodeSet::default()), 0, 10_000)
            .await
            .expect("context builds");

        assert_eq!(chunks.len(), 1);
        assert_eq!(records.len(), 2);
        let text = &chunks[0].text;
        assert!(text.starts_with("-----Reports-----\nid|title|occurrence weight|content|rank\n"));
        assert!(text.contains("1|Community 1|1|community one|5\n"));
        // equal weight, higher rank first
        let one = text.find("community one").expect("row 1");
        let two = text.find("community two").expect("row 2");
        assert!(one < two);
    }

    #[tokio::test]
    async fn test_chunks_respect_budget() {
        let b = builder(unshuffled());
        let header_tokens = WordTokenCounter::new().count(&b.header());
        let row_tokens = WordTokenCounter::new().count("1|Community 1|1|community one|5\n");
        let budget = header_tokens + row_tokens + 1;

        let (chunks, records) = b
            .build(&scope(NodeSet::default()), 0, budget)
            .await
            .expect("context builds");

        assert_eq!(chunks.len(), 2);
        assert_eq!(records.len(), 2);
        for chunk in &chunks {
            assert!(chunk.token_count <= budget, "{chunk:?}");
            assert!(chunk.text.starts_with("-----Reports-----\n"));
        }
    }

    #[tokio::test]
    async fn test_oversize_row_is_dropped() {
        let b = builder(unshuffled());
        let header_tokens = WordTokenCounter::new().count(&b.header());

        let (chunks, records) = b
            .build(&scope(NodeSet::default()), 0, header_tokens + 2)
            .await
            .expect("context builds");

        assert!(chunks.is_empty());
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_shuffle_is_deterministic() {
        let settings = ContextSettings::default();
        let scope = scope(NodeSet::default());
        let first = builder(settings.clone())
            .build(&scope, 3, 10_000)
            .await
            .expect("context builds");
        let second = builder(settings)
            .build(&scope, 3, 10_000)
            .await
            .expect("context builds");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_optional_columns() {
        let settings = ContextSettings {
            include_community_rank: false,
            include_community_weight: false,
            ..unshuffled()
        };
        let (chunks, _) = builder(settings)
            .build(&scope(NodeSet::new(["Y"])), 0, 10_000)
            .await
            .expect("context builds");
        assert_eq!(
            chunks[0].text,
            "-----Reports-----\nid|title|content\n2|Community 2|community two\n"
        );
    }
}
