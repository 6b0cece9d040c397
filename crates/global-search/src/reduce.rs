//! Reduce stage: rank key points, pack them under a token budget and synthesize the answer

use crate::prompts::{self, with_user_query};
use graphsearch_core::config::SearchConfig;
use graphsearch_core::error::Result;
use graphsearch_core::models::KeyPoint;
use graphsearch_core::prompt::render;
use graphsearch_core::tokenizer::TokenCounter;
use graphsearch_llm::{CompletionRequest, InvocationClient};
use std::sync::Arc;
use tracing::debug;

/// Reduce call parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Token budget of the packed analyst reports
    pub max_data_tokens: usize,
    pub response_type: String,
    pub allow_general_knowledge: bool,
}

impl From<&SearchConfig> for ReduceSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_tokens: config.reduce_max_tokens,
            temperature: config.reduce_temperature,
            max_data_tokens: config.max_data_tokens,
            response_type: config.response_type.clone(),
            allow_general_knowledge: config.allow_general_knowledge,
        }
    }
}

/// Packed analyst reports handed to the reduce prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedReports {
    pub text: String,
    pub token_count: usize,
    pub included: usize,
}

/// Output of the reduce call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceOutput {
    pub response: String,
    pub prompt_tokens: usize,
    pub context_tokens: usize,
}

/// Keep positive scores, order by score descending, and pack blocks until the budget is hit.
///
/// Equal scores keep their input order, which is ascending chunk order when the
/// points come from the map stage.
pub fn pack_key_points(
    key_points: &[KeyPoint],
    max_tokens: usize,
    tokenizer: &dyn TokenCounter,
) -> PackedReports {
    let mut ranked: Vec<&KeyPoint> = key_points.iter().filter(|p| p.score > 0).collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let mut blocks = Vec::new();
    let mut total_tokens = 0;
    for point in ranked {
        let block = format!(
            "----Analyst {}----\nImportance Score: {}\n{}",
            point.source_chunk_index + 1,
            point.score,
            point.answer
        );
        let block_tokens = tokenizer.count(&block);
        if total_tokens + block_tokens > max_tokens {
            break;
        }
        total_tokens += block_tokens;
        blocks.push(block);
    }

    PackedReports {
        included: blocks.len(),
        text: blocks.join("\n\n"),
        token_count: total_tokens,
    }
}

pub struct ReduceStage {
    client: Arc<InvocationClient>,
    tokenizer: Arc<dyn TokenCounter>,
    settings: ReduceSettings,
    template: String,
}

impl ReduceStage {
    pub fn new(
        client: Arc<InvocationClient>,
        tokenizer: Arc<dyn TokenCounter>,
        settings: ReduceSettings,
    ) -> Self {
        Self {
            client,
            tokenizer,
            settings,
            template: prompts::REDUCE_SYSTEM.to_string(),
        }
    }

    /// Replace the built-in reduce prompt; the template must contain `{report_data}`
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Make exactly one invocation, even when no key point survives filtering.
    ///
    /// Invocation failures are returned to the caller.
    pub async fn reduce(
        &self,
        key_points: &[KeyPoint],
        query: &str,
        language_instruction: &str,
    ) -> Result<ReduceOutput> {
        let packed = pack_key_points(
            key_points,
            self.settings.max_data_tokens,
            self.tokenizer.as_ref(),
        );
        debug!(
            "Packed {}/{} key points into {} tokens",
            packed.included,
            key_points.len(),
            packed.token_count
        );

        let general_knowledge = if self.settings.allow_general_knowledge {
            prompts::GENERAL_KNOWLEDGE_INSTRUCTION
        } else {
            ""
        };
        let reduce_prompt = render(
            &self.template,
            &[
                ("report_data", packed.text.as_str()),
                ("response_type", self.settings.response_type.as_str()),
                ("general_knowledge_instruction", general_knowledge),
                ("language_instruction", language_instruction),
            ],
        );
        let prompt_tokens = self.tokenizer.count(&reduce_prompt);

        let request = CompletionRequest::new(
            with_user_query(&reduce_prompt, query),
            self.settings.max_tokens,
            self.settings.temperature,
        );
        let output = self.client.invoke_request(&request).await?;

        Ok(ReduceOutput {
            response: output.into_text(),
            prompt_tokens,
            context_tokens: packed.token_count,
        })
    }
}
