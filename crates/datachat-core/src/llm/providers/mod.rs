//! LLM provider implementations
//!
//! Both supported providers speak the OpenAI chat-completions protocol; they
//! differ only in base URL and whether an API key is mandatory.

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::AgentError;
use crate::llm::LLM;
use std::sync::Arc;

pub mod openai;

pub use openai::OpenAIClient;

/// Create an LLM client based on the provider configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, AgentError> {
    let mut client = match &config.provider {
        LlmProvider::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                AgentError::ConfigError(
                    "No API key found for OpenAI. Set OPENAI_API_KEY".to_string(),
                )
            })?;
            OpenAIClient::new(api_key, config.model.clone()).with_api_base(config.base_url.clone())
        }
        LlmProvider::Custom { base_url } => {
            // Local OpenAI-compatible servers commonly accept any key.
            let api_key = config.api_key.clone().unwrap_or_default();
            OpenAIClient::new(api_key, config.model.clone()).with_api_base(base_url.clone())
        }
    };

    if let Some(temperature) = config.temperature {
        client = client.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.max_tokens {
        client = client.with_max_tokens(max_tokens);
    }

    log::info!(
        "Created {:?} LLM client for model {}",
        config.provider,
        config.model
    );
    Ok(Arc::new(client))
}
