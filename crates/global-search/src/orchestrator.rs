//! Query lifecycle: cache lookup, context, map, reduce, store

use crate::context::{ContextBuilder, ContextSettings, SearchScope};
use crate::map::{MapSettings, MapStage};
use crate::prompts::language_instruction;
use crate::reduce::{ReduceSettings, ReduceStage};
use crate::types::{SearchRequest, SearchResponse, SearchResult, TokenCounts};
use graphsearch_core::config::Config;
use graphsearch_core::error::{Error, InvocationError, Result, Stage};
use graphsearch_core::models::NodeSet;
use graphsearch_core::tokenizer::{create_token_counter, TokenCounter, WordTokenCounter};
use graphsearch_llm::InvocationClient;
use graphsearch_storage::{
    create_prompt_cache, GraphDataSource, JsonGraphDataSource, PromptCache, PromptHistoryEntry,
};
use regex::Regex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, field, info, info_span, warn, Instrument, Span};

static DATA_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r" ?\[Data: [^\]\n]*\]").ok());

/// Strip `[Data: ...]` citation markers from an answer
pub fn format_response(response: &str) -> String {
    match DATA_REFERENCE.as_ref() {
        Some(re) => re.replace_all(response, "").into_owned(),
        None => response.to_string(),
    }
}

/// Last pipeline stage a query entered, readable after its future is dropped
#[derive(Debug, Default)]
struct StageProgress(AtomicU8);

impl StageProgress {
    fn enter(&self, stage: Stage) {
        let code = match stage {
            Stage::BuildingContext => 0,
            Stage::Mapping => 1,
            Stage::Reducing => 2,
            Stage::Storing => 3,
        };
        self.0.store(code, Ordering::Release);
    }

    fn current(&self) -> Stage {
        match self.0.load(Ordering::Acquire) {
            0 => Stage::BuildingContext,
            1 => Stage::Mapping,
            2 => Stage::Reducing,
            _ => Stage::Storing,
        }
    }
}

/// Answers questions against a graph's community reports.
///
/// One instance is shared by all concurrent queries; the invocation client's
/// admission gate is the only state they contend on.
pub struct GlobalSearchOrchestrator {
    config: Config,
    cache: Arc<dyn PromptCache>,
    context_builder: ContextBuilder,
    map_stage: MapStage,
    reduce_stage: ReduceStage,
    client: Arc<InvocationClient>,
}

impl GlobalSearchOrchestrator {
    /// Orchestrator that budgets prompts by word-boundary token counts
    pub fn new(
        config: &Config,
        client: Arc<InvocationClient>,
        cache: Arc<dyn PromptCache>,
        data_source: Arc<dyn GraphDataSource>,
    ) -> Self {
        Self::with_tokenizer(
            config,
            client,
            cache,
            data_source,
            Arc::new(WordTokenCounter::new()),
        )
    }

    pub fn with_tokenizer(
        config: &Config,
        client: Arc<InvocationClient>,
        cache: Arc<dyn PromptCache>,
        data_source: Arc<dyn GraphDataSource>,
        tokenizer: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            config: config.clone(),
            cache,
            context_builder: ContextBuilder::new(
                data_source,
                Arc::clone(&tokenizer),
                ContextSettings::from(&config.search),
            ),
            map_stage: MapStage::new(
                Arc::clone(&client),
                Arc::clone(&tokenizer),
                MapSettings::from(&config.search),
            ),
            reduce_stage: ReduceStage::new(
                Arc::clone(&client),
                tokenizer,
                ReduceSettings::from(&config.search),
            ),
            client,
        }
    }

    /// Wire up the provider, cache backend and graph tables named in `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(InvocationClient::from_config(&config.llm)?);
        let cache = create_prompt_cache(&config.storage).await?;
        let data_source: Arc<dyn GraphDataSource> =
            Arc::new(JsonGraphDataSource::new(&config.graphs));
        let tokenizer = create_token_counter(&config.search)?;
        info!(
            "Global search ready: model={}, storage={}, graphs={}",
            client.model(),
            config.storage.provider,
            config.graphs.len()
        );
        Ok(Self::with_tokenizer(
            config,
            client,
            cache,
            data_source,
            tokenizer,
        ))
    }

    /// Answer a query, serving repeated (query, node set, graph) triples from the cache
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        request.validate()?;
        let span = info_span!(
            "global_search",
            graph = %request.graph_id,
            cache_hit = field::Empty
        );
        self.search_inner(request).instrument(span).await
    }

    async fn search_inner(&self, request: SearchRequest) -> Result<SearchResponse> {
        let nodes = request.node_set();

        debug!("Idle -> CacheLookup");
        match self
            .cache
            .lookup(&request.text, &nodes, &request.graph_id)
            .await
        {
            Ok(Some(cached)) => {
                Span::current().record("cache_hit", true);
                debug!("CacheLookup -> CacheHit -> Done");
                return Ok(SearchResponse {
                    response_text: format_response(&cached),
                    cache_hit: true,
                });
            }
            Ok(None) => debug!("CacheLookup -> CacheMiss"),
            Err(e) => warn!("Prompt cache lookup failed, treating as miss: {e}"),
        }
        Span::current().record("cache_hit", false);

        let result = self.run_with_deadline(&request, &nodes).await?;

        debug!("Reducing -> Storing");
        if let Err(e) = self
            .cache
            .store(&request.text, &result.response, &nodes, &request.graph_id)
            .await
        {
            warn!("Failed to store answer in prompt cache: {e}");
        }
        debug!("Storing -> Done");

        Ok(SearchResponse {
            response_text: format_response(&result.response),
            cache_hit: false,
        })
    }

    /// Run the full pipeline without consulting or updating the cache.
    ///
    /// The returned response is the raw reduce output, citations included.
    pub async fn search_detailed(&self, request: SearchRequest) -> Result<SearchResult> {
        request.validate()?;
        let span = info_span!(
            "global_search",
            graph = %request.graph_id,
            cache_hit = false
        );
        let nodes = request.node_set();
        self.run_with_deadline(&request, &nodes)
            .instrument(span)
            .await
    }

    /// Previously answered prompts for a graph, newest first
    pub async fn history(&self, graph_id: &str) -> Result<Vec<PromptHistoryEntry>> {
        self.cache.history(graph_id).await
    }

    /// Provider round trips made by this orchestrator's client so far
    pub fn llm_calls(&self) -> u64 {
        self.client.provider_calls()
    }

    async fn run_with_deadline(
        &self,
        request: &SearchRequest,
        nodes: &NodeSet,
    ) -> Result<SearchResult> {
        let progress = StageProgress::default();
        let outcome = match self.config.search.request_timeout_secs {
            Some(secs) => tokio::time::timeout(
                Duration::from_secs(secs),
                self.run_pipeline(request, nodes, &progress),
            )
            .await
            .map_err(|_| deadline_error(progress.current(), secs))
            .and_then(|r| r),
            None => self.run_pipeline(request, nodes, &progress).await,
        };
        if let Err(e) = &outcome {
            error!("Global search failed: {e}");
        }
        outcome
    }

    async fn run_pipeline(
        &self,
        request: &SearchRequest,
        nodes: &NodeSet,
        progress: &StageProgress,
    ) -> Result<SearchResult> {
        let start = Instant::now();
        let scope = SearchScope {
            graph_id: request.graph_id.clone(),
            entity_subset: nodes.clone(),
        };
        let language = language_instruction(request.language.as_deref());

        debug!("CacheMiss -> BuildingContext");
        progress.enter(Stage::BuildingContext);
        let (chunks, records) = self
            .context_builder
            .build(
                &scope,
                self.config.community_level_for(&request.graph_id),
                self.config.search.context_max_tokens,
            )
            .await
            .map_err(|e| Error::orchestration(Stage::BuildingContext, e))?;
        debug!(
            "Context built: {} chunks from {} reports",
            chunks.len(),
            records.len()
        );

        debug!("BuildingContext -> Mapping");
        progress.enter(Stage::Mapping);
        let map_responses = self.map_stage.map(&chunks, &request.text, &language).await;

        debug!("Mapping -> Reducing");
        progress.enter(Stage::Reducing);
        let key_points: Vec<_> = map_responses
            .iter()
            .flat_map(|r| r.points.iter().cloned())
            .collect();
        let reduced = self
            .reduce_stage
            .reduce(&key_points, &request.text, &language)
            .await
            .map_err(|e| Error::orchestration(Stage::Reducing, e))?;

        let elapsed = start.elapsed();
        info!(
            chunks = chunks.len(),
            key_points = key_points.len(),
            "Global search answered in {:.2}s",
            elapsed.as_secs_f64()
        );

        Ok(SearchResult {
            response: reduced.response,
            token_counts: TokenCounts {
                map_prompt: map_responses.iter().map(|r| r.prompt_tokens).sum(),
                reduce_prompt: reduced.prompt_tokens,
                reduce_context: reduced.context_tokens,
            },
            llm_call_count: chunks.len() + 1,
            context_chunk_count: chunks.len(),
            map_responses,
            elapsed,
        })
    }
}

/// Deadline expiry, attributed to the stage that was running
fn deadline_error(stage: Stage, secs: u64) -> Error {
    Error::orchestration(
        stage,
        Error::Invocation(InvocationError::Timeout(format!(
            "search did not finish within {secs}s"
        ))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_response_strips_citations() {
        let raw = "X leads the effort [Data: Reports (1, 2, +more)]. Y follows [Data: Reports (3)].";
        assert_eq!(format_response(raw), "X leads the effort. Y follows.");
    }

    #[test]
    fn test_format_response_keeps_text_between_citations() {
        let raw = "A [Data: Reports (1)] and B [Data: Reports (2)]\nC";
        assert_eq!(format_response(raw), "A and B\nC");
    }

    #[test]
    fn test_format_response_without_citations() {
        assert_eq!(format_response("plain answer"), "plain answer");
    }

    #[test]
    fn test_stage_progress_tracks_latest_stage() {
        let progress = StageProgress::default();
        assert_eq!(progress.current(), Stage::BuildingContext);
        progress.enter(Stage::Mapping);
        assert_eq!(progress.current(), Stage::Mapping);
        progress.enter(Stage::Reducing);
        assert_eq!(progress.current(), Stage::Reducing);
    }

    #[test]
    fn test_deadline_error_names_stage_and_is_upstream() {
        let err = deadline_error(Stage::Reducing, 5);
        assert_eq!(err.category(), graphsearch_core::ErrorCategory::UpstreamLlm);
        match err {
            Error::OrchestrationFailed { stage, source } => {
                assert_eq!(stage, Stage::Reducing);
                assert!(matches!(*source, Error::Invocation(InvocationError::Timeout(_))));
            }
            other => panic!("expected orchestration failure, got {other:?}"),
        }
    }
}
