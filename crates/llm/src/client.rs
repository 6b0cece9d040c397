//! Resilient invocation client shared by every search stage

use crate::cache::PromptResponseCache;
use crate::provider::{CompletionProvider, CompletionRequest};
use crate::retry::{attempt, RetryPolicy};
use graphsearch_core::config::LlmConfig;
use graphsearch_core::error::InvocationError;
use graphsearch_core::models::LlmOutput;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Wraps a [`CompletionProvider`] with an admission gate, per-attempt timeouts,
/// retries and an optional prompt-level cache.
///
/// One client is meant to be shared by all concurrent queries; its gate bounds
/// the number of in-flight provider calls across all of them.
pub struct InvocationClient {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    gate: Arc<Semaphore>,
    cache: Option<PromptResponseCache>,
    provider_calls: AtomicU64,
}

impl InvocationClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        let max_concurrent = config.max_concurrent_requests.max(1);
        info!("Initializing invocation client");
        info!("  Max concurrent requests: {max_concurrent}");
        info!("  Attempt timeout: {}s", config.timeout_secs);
        info!("  Max attempts: {}", config.max_retries);

        let cache = config
            .prompt_cache_enabled
            .then(|| PromptResponseCache::new(config.prompt_cache_capacity));

        Self {
            model: provider.model(),
            provider,
            policy: RetryPolicy::from_config(config),
            attempt_timeout: Duration::from_secs(config.timeout_secs),
            gate: Arc::new(Semaphore::new(max_concurrent)),
            cache,
            provider_calls: AtomicU64::new(0),
        }
    }

    /// Build the provider named in `config` and wrap it
    pub fn from_config(config: &LlmConfig) -> graphsearch_core::Result<Self> {
        let provider = crate::create_completion_provider(config)?;
        Ok(Self::new(provider, config))
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Plain-text completion of `prompt`
    pub async fn invoke(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<LlmOutput, InvocationError> {
        self.invoke_request(&CompletionRequest::new(prompt, max_tokens, temperature))
            .await
    }

    pub async fn invoke_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<LlmOutput, InvocationError> {
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| PromptResponseCache::key(&self.model, request));
        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            if let Some(output) = cache.get(key).await {
                debug!("Prompt cache hit");
                return Ok(output);
            }
        }

        let output = attempt(&self.policy, || self.attempt_once(request)).await?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, output.clone()).await;
        }
        Ok(output)
    }

    /// One gated, time-bounded provider call. The permit is released before any backoff.
    async fn attempt_once(&self, request: &CompletionRequest) -> Result<LlmOutput, InvocationError> {
        let _permit = self.gate.acquire().await.map_err(|e| {
            InvocationError::permanent(format!("Failed to acquire concurrency permit: {e}"))
        })?;

        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.attempt_timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(InvocationError::Timeout(format!(
                "no response within {:?}",
                self.attempt_timeout
            ))),
        }
    }

    /// Number of provider calls made so far, retries included, cache hits excluded
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    /// Permits currently free in the admission gate
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}
