//! Completion provider abstraction and HTTP status classification

use async_trait::async_trait;
use graphsearch_core::error::InvocationError;
use graphsearch_core::models::LlmOutput;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// One completion call as seen by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask for a JSON object when the provider supports it
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
            json_mode: false,
        }
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// A remote completion backend.
///
/// Implementations perform exactly one round trip per call; retries, timeouts and
/// admission control belong to [`crate::InvocationClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmOutput, InvocationError>;

    /// Model identifier, part of the prompt cache key
    fn model(&self) -> String;
}

/// Map a non-success HTTP status to an invocation error
pub(crate) fn classify_status(status: StatusCode, body: &str) -> InvocationError {
    let message = format!("HTTP {status}: {}", truncate_body(body));
    if status == StatusCode::TOO_MANY_REQUESTS {
        InvocationError::RateLimited(message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        InvocationError::transient(message)
    } else {
        InvocationError::permanent(message)
    }
}

/// Map a transport-level reqwest failure to an invocation error
pub(crate) fn classify_transport_error(err: &reqwest::Error) -> InvocationError {
    if err.is_timeout() {
        InvocationError::Timeout(err.to_string())
    } else if err.is_decode() {
        InvocationError::ParseError(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        InvocationError::transient(err.to_string())
    } else {
        InvocationError::permanent(err.to_string())
    }
}

fn truncate_body(body: &str) -> &str {
    const MAX_BODY_CHARS: usize = 500;
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            InvocationError::RateLimited(_)
        ));
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_retryable());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "bad").is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_retryable());
        assert!(!classify_status(StatusCode::NOT_FOUND, "").is_retryable());
    }

    #[test]
    fn test_long_error_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let err = classify_status(StatusCode::BAD_GATEWAY, &body);
        assert!(err.to_string().len() < 600);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("hi", 10, 0.0).with_json_mode(true);
        assert!(request.json_mode);
        assert_eq!(request.max_tokens, 10);
    }
}
