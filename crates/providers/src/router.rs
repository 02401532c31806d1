//! Picks and builds the chat backend named in the `[model]` config section.

use std::sync::Arc;

use reasonchain_config::ModelConfig;
use reasonchain_core::error::ProviderError;
use reasonchain_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Where a named backend listens and whether it wants a key.
struct Endpoint {
    base_url: &'static str,
    needs_key: bool,
}

fn known_endpoint(provider: &str) -> Option<Endpoint> {
    let (base_url, needs_key) = match provider {
        "openrouter" => ("https://openrouter.ai/api/v1", true),
        "openai" => ("https://api.openai.com/v1", true),
        "deepseek" => ("https://api.deepseek.com/v1", true),
        "groq" => ("https://api.groq.com/openai/v1", true),
        "together" => ("https://api.together.xyz/v1", true),
        "ollama" => ("http://localhost:11434/v1", false),
        "vllm" => ("http://localhost:8000/v1", false),
        "llamacpp" | "llama.cpp" => ("http://localhost:8080/v1", false),
        _ => return None,
    };
    Some(Endpoint { base_url, needs_key })
}

/// Build the provider described by `config`.
///
/// `api_url` overrides the backend's usual address, and is required for
/// backends this crate does not know by name. Hosted backends need an
/// `api_key`; a URL override alone does not waive that.
pub fn build_provider(config: &ModelConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.as_str();
    let known = known_endpoint(name);
    let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());

    let base_url = match (&config.api_url, &known) {
        (Some(url), _) => url.clone(),
        (None, Some(endpoint)) => endpoint.base_url.to_string(),
        (None, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{name}' needs model.api_url"
            )));
        }
    };

    if known.is_some_and(|e| e.needs_key) && api_key.is_none() {
        return Err(ProviderError::NotConfigured(format!(
            "provider '{name}' needs model.api_key"
        )));
    }

    debug!(provider = name, base_url = %base_url, "Building chat provider");
    Ok(Arc::new(OpenAiCompatProvider::new(name, &base_url, api_key)))
}
