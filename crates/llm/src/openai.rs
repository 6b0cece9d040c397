//! OpenAI-compatible chat completions provider

use crate::provider::{
    classify_status, classify_transport_error, CompletionProvider, CompletionRequest,
};
use async_trait::async_trait;
use graphsearch_core::error::{Error, InvocationError, Result};
use graphsearch_core::models::LlmOutput;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Provider for OpenAI and any server exposing `/chat/completions` (vLLM, Ollama, ...)
pub struct OpenAiChatProvider {
    client: Client,
    model: String,
    api_base_url: String,
    api_key: Option<String>,
}

impl OpenAiChatProvider {
    /// Create a new chat provider
    ///
    /// # Arguments
    /// * `model` - Model name sent with every request
    /// * `api_base_url` - Base URL ending before `/chat/completions`
    /// * `api_key` - Bearer token, optional for local servers
    /// * `timeout_secs` - Transport timeout for one HTTP round trip
    pub fn new(
        model: String,
        api_base_url: Option<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let api_base_url = api_base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        info!("Initializing OpenAI-compatible chat provider");
        info!("  Model: {model}");
        info!("  API Base URL: {api_base_url}");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            model,
            api_base_url,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChatProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<LlmOutput, InvocationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let url = format!("{}/chat/completions", self.api_base_url);
        debug!("Sending chat completion request ({} prompt chars)", request.prompt.len());

        let mut builder = self.client.post(&url).json(&body);
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(classify_status(status, &error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        parse_chat_response(&text)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

fn parse_chat_response(body: &str) -> std::result::Result<LlmOutput, InvocationError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        InvocationError::ParseError(format!("Invalid chat completion body: {e}"))
    })?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InvocationError::ParseError("Chat completion has no choices".into()))?
        .message
        .content
        .unwrap_or_default();
    Ok(LlmOutput::Text(content))
}
