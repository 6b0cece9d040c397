//! LLM invocation for graphsearch
//!
//! This crate provides the resilient client every search stage calls through:
//! completion providers (OpenAI-compatible chat, Yandex Foundation Models), a retry
//! primitive with exponential backoff, a shared admission gate and an optional
//! prompt-level response cache.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use graphsearch_core::config::LlmConfig;
use graphsearch_core::error::{Error, Result};
use std::sync::Arc;
use tracing::info;

mod cache;
mod client;
mod openai;
mod provider;
pub mod retry;
mod yandex;

pub use cache::PromptResponseCache;
pub use client::InvocationClient;
pub use graphsearch_core::error::InvocationError;
pub use openai::OpenAiChatProvider;
pub use provider::{CompletionProvider, CompletionRequest};
pub use retry::{attempt, RetryPolicy, RetryState};
pub use yandex::YandexGptProvider;

/// Create a completion provider based on configuration
///
/// # Arguments
/// * `config` - LLM configuration including provider type and credentials
pub fn create_completion_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "openai" => {
            info!("Creating OpenAI-compatible completion provider");
            let provider = OpenAiChatProvider::new(
                config.model.clone(),
                config.api_base_url.clone(),
                config.resolve_api_key(),
                config.timeout_secs,
            )?;
            Ok(Arc::new(provider))
        }
        "yandex" => {
            let token = config.resolve_api_key().ok_or_else(|| {
                Error::config("Yandex token required. Set llm.api_key or YANDEX_TOKEN env var")
            })?;
            let folder_id = config.resolve_folder_id().ok_or_else(|| {
                Error::config("Yandex folder id required. Set llm.folder_id or YANDEX_FOLDER_ID")
            })?;

            info!("Creating Yandex GPT completion provider");
            let provider = YandexGptProvider::new(
                &config.model,
                config.api_base_url.clone(),
                token,
                folder_id,
                config.timeout_secs,
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(Error::config(format!(
            "Unknown LLM provider: '{other}'. Valid providers: openai, yandex"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = LlmConfig {
            provider: "anthropic-direct".to_string(),
            ..LlmConfig::default()
        };
        let err = create_completion_provider(&config)
            .err()
            .expect("unknown provider must fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_yandex_with_explicit_credentials() {
        let config = LlmConfig {
            provider: "yandex".to_string(),
            model: "yandexgpt-lite".to_string(),
            api_key: Some("token".to_string()),
            folder_id: Some("b1g".to_string()),
            ..LlmConfig::default()
        };
        let provider = create_completion_provider(&config).expect("provider builds");
        assert_eq!(provider.model(), "gpt://b1g/yandexgpt-lite/latest");
    }

    #[test]
    fn test_openai_provider_without_key() {
        let config = LlmConfig {
            api_base_url: Some("http://localhost:8000/v1".to_string()),
            ..LlmConfig::default()
        };
        let provider = create_completion_provider(&config).expect("provider builds");
        assert_eq!(provider.model(), config.model);
    }
}
