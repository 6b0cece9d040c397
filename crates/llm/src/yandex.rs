//! Yandex Foundation Models completion provider

use crate::provider::{
    classify_status, classify_transport_error, CompletionProvider, CompletionRequest,
};
use async_trait::async_trait;
use graphsearch_core::error::{Error, InvocationError, Result};
use graphsearch_core::models::{Alternative, LlmOutput};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_YANDEX_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionBody<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: String,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<RawAlternative>,
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    #[serde(default)]
    message: Option<AlternativeMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}

/// Provider for the Yandex Cloud completion API, returning structured alternatives
pub struct YandexGptProvider {
    client: Client,
    model_uri: String,
    url: String,
    token: String,
    folder_id: String,
}

impl YandexGptProvider {
    /// Create a new Yandex provider
    ///
    /// `model` is either a full `gpt://` URI or a bare model name that is expanded
    /// to `gpt://{folder_id}/{model}/latest`.
    pub fn new(
        model: &str,
        api_base_url: Option<String>,
        token: String,
        folder_id: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let model_uri = model_uri(model, &folder_id);
        let url = api_base_url.unwrap_or_else(|| DEFAULT_YANDEX_COMPLETION_URL.to_string());

        info!("Initializing Yandex GPT provider");
        info!("  Model URI: {model_uri}");
        info!("  URL: {url}");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            model_uri,
            url,
            token,
            folder_id,
        })
    }
}

fn model_uri(model: &str, folder_id: &str) -> String {
    if model.starts_with("gpt://") {
        model.to_string()
    } else {
        format!("gpt://{folder_id}/{model}/latest")
    }
}

#[async_trait]
impl CompletionProvider for YandexGptProvider {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<LlmOutput, InvocationError> {
        let body = CompletionBody {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: request.temperature,
                max_tokens: request.max_tokens.to_string(),
            },
            messages: vec![Message {
                role: "user",
                text: &request.prompt,
            }],
        };

        debug!("Sending Yandex completion request ({} prompt chars)", request.prompt.len());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .header("X-Folder-ID", &self.folder_id)
            .json(&body)
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
        parse_completion_response(&text)
    }

    fn model(&self) -> String {
        self.model_uri.clone()
    }
}

fn parse_completion_response(body: &str) -> std::result::Result<LlmOutput, InvocationError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        InvocationError::ParseError(format!("Invalid Yandex completion body: {e}"))
    })?;
    let alternatives = parsed
        .result
        .alternatives
        .into_iter()
        .map(|alt| Alternative {
            output: alt
                .message
                .map(|m| m.text)
                .or(alt.text)
                .unwrap_or_default(),
        })
        .collect();
    Ok(LlmOutput::Structured(alternatives))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_uri_expansion() {
        assert_eq!(
            model_uri("yandexgpt-lite", "b1g"),
            "gpt://b1g/yandexgpt-lite/latest"
        );
        assert_eq!(
            model_uri("gpt://other/yandexgpt/rc", "b1g"),
            "gpt://other/yandexgpt/rc"
        );
    }

    #[test]
    fn test_parse_message_alternatives() {
        let body = r#"{"result":{"alternatives":[
            {"message":{"role":"assistant","text":"first"},"status":"ALTERNATIVE_STATUS_FINAL"},
            {"message":{"role":"assistant","text":"second"},"status":"ALTERNATIVE_STATUS_FINAL"}
        ],"modelVersion":"1"}}"#;
        let output = parse_completion_response(body).expect("valid body");
        assert_eq!(output.into_text(), "first");
    }

    #[test]
    fn test_parse_flat_text_alternative() {
        let body = r#"{"result":{"alternatives":[{"text":"flat"}]}}"#;
        assert_eq!(
            parse_completion_response(body),
            Ok(LlmOutput::Structured(vec![Alternative {
                output: "flat".to_string()
            }]))
        );
    }

    #[test]
    fn test_parse_error_body() {
        assert!(matches!(
            parse_completion_response(r#"{"error":"quota"}"#),
            Err(InvocationError::ParseError(_))
        ));
    }

    #[test]
    fn test_body_serialization() {
        let body = CompletionBody {
            model_uri: "gpt://f/m/latest",
            completion_options: CompletionOptions {
                stream: false,
                temperature: 0.0,
                max_tokens: "2000".to_string(),
            },
            messages: vec![Message {
                role: "user",
                text: "hi",
            }],
        };
        let json = serde_json::to_value(&body).expect("serializable");
        assert_eq!(json["modelUri"], "gpt://f/m/latest");
        assert_eq!(json["completionOptions"]["maxTokens"], "2000");
        assert_eq!(json["messages"][0]["text"], "hi");
    }
}
