//! Structured-output language model over any raw [`Provider`].
//!
//! Renders a [`Signature`] into a system prompt that asks for exactly one
//! JSON object, renders the named inputs as labelled sections, and extracts
//! the JSON object from the reply. Validation against the signature happens
//! in [`LanguageModel::invoke`].

use async_trait::async_trait;
use reasonchain_core::error::GenerationError;
use reasonchain_core::message::Message;
use reasonchain_core::model::{Inputs, LanguageModel};
use reasonchain_core::provider::{Provider, ProviderRequest};
use reasonchain_core::signature::Signature;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// A `LanguageModel` that speaks JSON to a chat provider.
pub struct StructuredModel {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl StructuredModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: Some(2048),
        }
    }

    /// Build from the `[model]` config section.
    pub fn from_config(provider: Arc<dyn Provider>, config: &reasonchain_config::ModelConfig) -> Self {
        Self::new(provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    /// Build the provider and the model from the `[model]` config section alone.
    pub fn from_model_config(
        config: &reasonchain_config::ModelConfig,
    ) -> Result<Self, reasonchain_core::error::ProviderError> {
        let provider = crate::router::build_provider(config)?;
        Ok(Self::from_config(provider, config))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn system_prompt(signature: &Signature) -> String {
        let fields: Vec<String> = signature
            .outputs
            .iter()
            .map(|f| {
                let hint = json_type_hint(f.ty);
                if f.optional {
                    format!("- \"{}\": {hint} (may be omitted)", f.name)
                } else {
                    format!("- \"{}\": {hint}", f.name)
                }
            })
            .collect();

        let mut prompt = String::new();
        if !signature.instructions.is_empty() {
            prompt.push_str(&signature.instructions);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "Task signature: {signature}\n\n\
            Respond with a single JSON object and nothing else. It must contain exactly these fields:\n{}",
            fields.join("\n")
        ));
        prompt
    }

    fn user_prompt(signature: &Signature, inputs: &Inputs) -> String {
        signature
            .inputs
            .iter()
            .map(|name| {
                let value = inputs.get(name).map(String::as_str).unwrap_or_default();
                format!("## {name}\n{value}")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn json_type_hint(ty: reasonchain_core::FieldType) -> &'static str {
    match ty {
        reasonchain_core::FieldType::Text => "string",
        reasonchain_core::FieldType::TextList => "array of strings",
        reasonchain_core::FieldType::Float => "number",
    }
}

/// Pull the JSON object out of a model reply.
///
/// Accepts a bare object, an object inside a Markdown code fence, or an
/// object surrounded by prose.
pub fn extract_json_object(content: &str) -> Result<Map<String, Value>, GenerationError> {
    let trimmed = content.trim();

    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(GenerationError::Unparseable(format!(
                "no JSON object in reply: {:.80}",
                trimmed
            )));
        }
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GenerationError::Unparseable(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(GenerationError::Unparseable(e.to_string())),
    }
}

#[async_trait]
impl LanguageModel for StructuredModel {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn generate(
        &self,
        signature: &Signature,
        inputs: &Inputs,
    ) -> Result<Map<String, Value>, GenerationError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(Self::system_prompt(signature)),
                Message::user(Self::user_prompt(signature, inputs)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
        };

        debug!(model = %self.model, signature = %signature, "Structured generation");

        let response = self.provider.complete(request).await?;
        extract_json_object(&response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reasonchain_core::error::ProviderError;
    use reasonchain_core::provider::ProviderResponse;
    use reasonchain_core::signature::FieldType;
    use std::sync::Mutex;

    /// Replies with a fixed body and records the last request.
    struct CannedProvider {
        reply: String,
        last_request: Mutex<Option<ProviderRequest>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(ProviderResponse {
                message: Message::assistant(self.reply.clone()),
                usage: None,
                model: "canned-model".into(),
            })
        }
    }

    struct DownProvider;

    #[async_trait]
    impl Provider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn verify_signature() -> Signature {
        Signature::new("Judge the answer.")
            .input("question")
            .input("answer")
            .output("confidence", FieldType::Float)
            .output("issues", FieldType::TextList)
    }

    fn verify_inputs() -> Inputs {
        reasonchain_core::model::inputs([
            ("question", "What is 2+2?".to_string()),
            ("answer", "4".to_string()),
        ])
    }

    #[test]
    fn extracts_fenced_and_embedded_objects() {
        let fenced = "```json\n{\"answer\": \"4\"}\n```";
        assert_eq!(extract_json_object(fenced).unwrap()["answer"], "4");

        let prose = "Sure! Here it is: {\"answer\": \"4\"} Hope that helps.";
        assert_eq!(extract_json_object(prose).unwrap()["answer"], "4");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            extract_json_object("I cannot answer that."),
            Err(GenerationError::Unparseable(_))
        ));
        assert!(matches!(
            extract_json_object("{not json}"),
            Err(GenerationError::Unparseable(_))
        ));
    }

    #[tokio::test]
    async fn renders_signature_and_inputs() {
        let provider = Arc::new(CannedProvider::new(r#"{"confidence": 0.9, "issues": []}"#));
        let model = StructuredModel::new(provider.clone(), "mock-model");

        let outputs = model
            .invoke(&verify_signature(), &verify_inputs())
            .await
            .unwrap();
        assert!((outputs.float("confidence").unwrap() - 0.9).abs() < 1e-9);

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert!(request.json_mode);
        assert_eq!(request.model, "mock-model");
        let system = &request.messages[0].content;
        assert!(system.starts_with("Judge the answer."));
        assert!(system.contains("\"confidence\": number"));
        assert!(system.contains("\"issues\": array of strings"));
        let user = &request.messages[1].content;
        assert!(user.contains("## question\nWhat is 2+2?"));
        assert!(user.contains("## answer\n4"));
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_typed_failure() {
        let provider = Arc::new(CannedProvider::new(r#"{"confidence": "very"}"#));
        let model = StructuredModel::new(provider, "mock-model");
        let err = model
            .invoke(&verify_signature(), &verify_inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::WrongType { .. }));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let model = StructuredModel::new(Arc::new(DownProvider), "mock-model");
        let err = model
            .invoke(&verify_signature(), &verify_inputs())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Provider(ProviderError::Network(_))));
    }

    #[test]
    fn from_config_uses_model_section() {
        let mut config = reasonchain_config::ModelConfig::default();
        config.model = "llama3".into();
        config.max_tokens = 512;
        let model = StructuredModel::from_config(Arc::new(DownProvider), &config);
        assert_eq!(model.model, "llama3");
        assert_eq!(model.max_tokens, Some(512));
    }

    #[test]
    fn from_model_config_builds_the_provider() {
        let mut config = reasonchain_config::ModelConfig::default();
        config.provider = "ollama".into();
        config.model = "qwen2.5".into();
        let model = StructuredModel::from_model_config(&config).unwrap();
        assert_eq!(model.provider.name(), "ollama");
        assert_eq!(model.model, "qwen2.5");

        config.provider = "openai".into();
        config.api_key = None;
        assert!(matches!(
            StructuredModel::from_model_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn optional_outputs_are_marked_in_the_prompt() {
        let provider = Arc::new(CannedProvider::new(r#"{"confidence": 0.8}"#));
        let model = StructuredModel::new(provider.clone(), "gpt-4o");
        let signature = Signature::new("Judge the answer.")
            .input("question")
            .input("answer")
            .output("confidence", FieldType::Float)
            .optional_output("issues", FieldType::TextList);

        let outputs = model.invoke(&signature, &verify_inputs()).await.unwrap();
        assert_eq!(outputs.text_list("issues").unwrap(), Vec::<String>::new());

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        let system = &request.messages[0].content;
        assert!(system.contains("\"issues\": array of strings (may be omitted)"), "{system}");
        assert!(system.contains("\"confidence\": number\n"), "{system}");
    }
}
