//! Chat-completions client for any endpoint speaking the OpenAI wire format
//! (OpenAI, OpenRouter, Ollama, vLLM, Groq, llama.cpp server).
//!
//! Only the non-streaming `/chat/completions` call is used: every reasoning
//! stage wants one whole JSON object back.

use async_trait::async_trait;
use reasonchain_core::error::ProviderError;
use reasonchain_core::message::{Message, Role};
use reasonchain_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Seconds a rate-limited caller is told to wait when the server gives no hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

pub struct OpenAiCompatProvider {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    /// Local servers usually take no key.
    pub fn new(name: impl Into<String>, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Full URL completions are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn wire_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::wire_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    /// Typed error for a non-success HTTP status.
    fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => ProviderError::AuthenticationFailed(body),
            404 => ProviderError::ModelNotFound(body),
            _ => ProviderError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.model,
            json_mode = request.json_mode,
            "Posting chat completion"
        );

        let mut call = self
            .client
            .post(&self.endpoint)
            .json(&Self::request_body(&request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }

        let response = call
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status = status.as_u16(), body = %body, "Completion rejected");
            return Err(Self::status_error(status.as_u16(), retry_after, body));
        }

        let completion: Completion = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: status.as_u16(),
            message: format!("Unreadable completion body: {e}"),
        })?;

        completion.into_response()
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct Completion {
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl Completion {
    /// The first choice becomes the assistant reply; extra choices are ignored.
    fn into_response(self) -> Result<ProviderResponse, ProviderError> {
        let Some(choice) = self.choices.into_iter().next() else {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "Completion carried no choices".into(),
            });
        };

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: self.usage,
            model: self.model,
        })
    }
}
