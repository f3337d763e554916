//! Provider construction from configuration.
//!
//! Picks the base URL for the configured provider name, checks that a key is
//! present where one is needed, and wraps the result in a [`RetryProvider`].

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;
use loopwright_core::error::ProviderError;
use loopwright_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Build the configured reasoning service.
pub fn build_from_config(
    config: &loopwright_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.as_str();
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(name));

    let api_key = match (&config.api_key, requires_api_key(name)) {
        (Some(key), _) => key.clone(),
        (None, false) => String::new(),
        (None, true) => {
            return Err(ProviderError::NotConfigured(format!(
                "provider '{name}' needs an API key"
            )));
        }
    };

    debug!(provider = %name, base_url = %base_url, model = %config.model, "Building provider");

    let http = OpenAiCompatProvider::new(name, base_url, api_key)
        .with_timeout(Duration::from_secs(config.agent.request_timeout_secs));

    let retry = &config.provider_retry;
    if retry.max_retries == 0 {
        return Ok(Arc::new(http));
    }

    Ok(Arc::new(
        RetryProvider::new(Arc::new(http))
            .with_max_retries(retry.max_retries)
            .with_base_delay(Duration::from_millis(retry.base_delay_ms)),
    ))
}

/// Local servers accept any key.
fn requires_api_key(provider_name: &str) -> bool {
    !matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
