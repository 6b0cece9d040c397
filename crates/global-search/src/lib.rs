//! Map-reduce global search over community reports
//!
//! A query is answered by packing the relevant community reports of a graph into
//! context chunks, asking the LLM for scored key points on every chunk
//! concurrently (map), and synthesizing the best points into one answer (reduce).
//! Answers are memoized per (query, node set, graph) in the prompt cache.
//!
//! # Public API
//!
//! ## Main Entry Point
//! - [`GlobalSearchOrchestrator`] - Runs the query lifecycle
//!
//! ## Request/Response Models
//! - [`SearchRequest`] - Query text, graph and optional entity subset
//! - [`SearchResponse`] - Formatted answer plus cache-hit flag
//! - [`SearchResult`] - Full map/reduce trace of a computed answer
//!
//! ## Pipeline Stages
//! - [`ContextBuilder`], [`MapStage`], [`ReduceStage`]
//!
//! Prompt templates are private and not exported.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod context;
mod map;
mod orchestrator;
mod prompts;
mod reduce;
mod types;

pub use context::{ContextBuilder, ContextSettings, ReportRecord, SearchScope};
pub use map::{parse_map_response, MapSettings, MapStage};
pub use orchestrator::{format_response, GlobalSearchOrchestrator};
pub use reduce::{pack_key_points, PackedReports, ReduceOutput, ReduceSettings, ReduceStage};
pub use types::{MapResponse, SearchRequest, SearchResponse, SearchResult, TokenCounts};

/// Strip markdown code fences from LLM response.
fn strip_markdown_fences(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(fenced) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the info string (```json)
    let body = match fenced.find('\n') {
        Some(newline_pos) => &fenced[newline_pos + 1..],
        None => fenced.strip_prefix("json").unwrap_or(fenced),
    };

    match body.rfind("```") {
        Some(close_pos) => body[..close_pos].trim(),
        None => body.trim(),
    }
}
