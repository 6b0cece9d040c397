//! In-memory prompt-level response cache

use crate::provider::CompletionRequest;
use graphsearch_core::models::LlmOutput;
use moka::future::Cache;
use twox_hash::XxHash3_128;

/// Bounded cache of completions keyed by everything that influences the reply
#[derive(Clone)]
pub struct PromptResponseCache {
    entries: Cache<u128, LlmOutput>,
}

impl PromptResponseCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub fn key(model: &str, request: &CompletionRequest) -> u128 {
        let mut bytes = Vec::with_capacity(model.len() + request.prompt.len() + 11);
        bytes.extend_from_slice(model.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(request.prompt.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&request.max_tokens.to_le_bytes());
        bytes.extend_from_slice(&request.temperature.to_bits().to_le_bytes());
        bytes.push(u8::from(request.json_mode));
        XxHash3_128::oneshot(&bytes)
    }

    pub async fn get(&self, key: u128) -> Option<LlmOutput> {
        self.entries.get(&key).await
    }

    pub async fn insert(&self, key: u128, output: LlmOutput) {
        self.entries.insert(key, output).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_every_field() {
        let base = CompletionRequest::new("prompt", 1000, 0.0);
        let key = PromptResponseCache::key("m", &base);

        assert_eq!(key, PromptResponseCache::key("m", &base.clone()));
        assert_ne!(key, PromptResponseCache::key("other", &base));
        assert_ne!(
            key,
            PromptResponseCache::key("m", &CompletionRequest::new("prompt!", 1000, 0.0))
        );
        assert_ne!(
            key,
            PromptResponseCache::key("m", &CompletionRequest::new("prompt", 2000, 0.0))
        );
        assert_ne!(
            key,
            PromptResponseCache::key("m", &CompletionRequest::new("prompt", 1000, 0.5))
        );
        assert_ne!(
            key,
            PromptResponseCache::key("m", &base.clone().with_json_mode(true))
        );
    }

    #[tokio::test]
    async fn test_get_after_insert() {
        let cache = PromptResponseCache::new(16);
        let key = PromptResponseCache::key("m", &CompletionRequest::new("p", 10, 0.0));
        assert!(cache.get(key).await.is_none());

        cache.insert(key, LlmOutput::Text("cached".into())).await;
        assert_eq!(cache.get(key).await, Some(LlmOutput::Text("cached".into())));
    }
}
