//! Map stage: one concurrent LLM call per context chunk

use crate::prompts::{self, with_user_query};
use crate::strip_markdown_fences;
use crate::types::MapResponse;
use futures::future::join_all;
use graphsearch_core::config::SearchConfig;
use graphsearch_core::models::{ContextChunk, KeyPoint};
use graphsearch_core::prompt::render;
use graphsearch_core::tokenizer::TokenCounter;
use graphsearch_llm::{CompletionRequest, InvocationClient};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Map call parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MapSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
}

impl From<&SearchConfig> for MapSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_tokens: config.map_max_tokens,
            temperature: config.map_temperature,
            json_mode: config.json_mode,
        }
    }
}

pub struct MapStage {
    client: Arc<InvocationClient>,
    tokenizer: Arc<dyn TokenCounter>,
    settings: MapSettings,
    template: String,
}

impl MapStage {
    pub fn new(
        client: Arc<InvocationClient>,
        tokenizer: Arc<dyn TokenCounter>,
        settings: MapSettings,
    ) -> Self {
        Self {
            client,
            tokenizer,
            settings,
            template: prompts::MAP_SYSTEM.to_string(),
        }
    }

    /// Replace the built-in map prompt; the template must contain `{context_data}`
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Run one map call per chunk concurrently.
    ///
    /// Returns exactly one response per chunk, in chunk order. Failed calls and
    /// unusable replies degrade to a single zero-score placeholder point.
    pub async fn map(
        &self,
        chunks: &[ContextChunk],
        query: &str,
        language_instruction: &str,
    ) -> Vec<MapResponse> {
        let calls = chunks
            .iter()
            .enumerate()
            .map(|(index, chunk)| self.map_chunk(index, chunk, query, language_instruction));

        let responses = join_all(calls).await;

        let placeholders = responses
            .iter()
            .filter(|r| r.points.len() == 1 && r.points[0] == KeyPoint::placeholder(r.chunk_index))
            .count();
        if placeholders > 0 {
            warn!(
                "{placeholders}/{} map responses were unusable and replaced by placeholders",
                responses.len()
            );
        }
        responses
    }

    async fn map_chunk(
        &self,
        index: usize,
        chunk: &ContextChunk,
        query: &str,
        language_instruction: &str,
    ) -> MapResponse {
        let start = Instant::now();
        let map_prompt = render(
            &self.template,
            &[
                ("context_data", chunk.text.as_str()),
                ("language_instruction", language_instruction),
            ],
        );
        let prompt_tokens = self.tokenizer.count(&map_prompt);

        let request = CompletionRequest::new(
            with_user_query(&map_prompt, query),
            self.settings.max_tokens,
            self.settings.temperature,
        )
        .with_json_mode(self.settings.json_mode);

        let points = match self.client.invoke_request(&request).await {
            Ok(output) => {
                let text = output.into_text();
                parse_map_response(&text, index).unwrap_or_else(|reason| {
                    debug!("Map response for chunk {index} unusable: {reason}");
                    vec![KeyPoint::placeholder(index)]
                })
            }
            Err(e) => {
                warn!("Map call for chunk {index} failed: {e}");
                vec![KeyPoint::placeholder(index)]
            }
        };

        MapResponse {
            chunk_index: index,
            points,
            prompt_tokens,
            elapsed: start.elapsed(),
        }
    }
}

/// Parse a map reply of the form `{"points": [{"description": ..., "score": ...}]}`.
///
/// Points missing a description or score are skipped. Scores may be JSON
/// integers, floats (truncated) or strings holding a number.
pub fn parse_map_response(
    response: &str,
    chunk_index: usize,
) -> std::result::Result<Vec<KeyPoint>, String> {
    let body = strip_markdown_fences(response);
    let value: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;

    let points = value
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing \"points\" array".to_string())?;

    let mut key_points = Vec::with_capacity(points.len());
    for point in points {
        let (Some(description), Some(score)) = (point.get("description"), point.get("score"))
        else {
            continue;
        };
        let answer = match description {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        key_points.push(KeyPoint {
            source_chunk_index: chunk_index,
            answer,
            score: parse_score(score)?,
        });
    }
    Ok(key_points)
}

fn parse_score(score: &Value) -> std::result::Result<i64, String> {
    match score {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .ok_or_else(|| format!("score out of range: {n}")),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f.trunc() as i64))
                .map_err(|_| format!("score is not a number: {s:?}"))
        }
        other => Err(format!("score has unexpected type: {other}")),
    }
}
