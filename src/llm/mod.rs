//! LLM integration.
//!
//! The runtime only sees [`LlmProvider`]. Two implementations ship:
//! - **OpenAI**: any Chat Completions endpoint, through rig-core and the
//!   [`RigAdapter`]
//! - **Scripted**: replays canned responses (tests, offline runs)

pub mod provider;
mod rig_adapter;
pub mod scripted;

pub use provider::*;
pub use rig_adapter::RigAdapter;
pub use scripted::ScriptedProvider;

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client = openai::Client::<reqwest::Client>::builder()
        .api_key(config.api_key.expose_secret())
        .base_url(&config.base_url)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: "openai".to_string(),
            reason: format!("Failed to create OpenAI client: {}", e),
        })?
        .completions_api();

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {}, base: {})", config.model, config.base_url);
    Ok(Arc::new(RigAdapter::new(model, &config.model, "openai", config.timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_reports_model() {
        let config = LlmConfig {
            api_key: secrecy::SecretString::from("sk-test"),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-4.1-mini".to_string(),
            timeout: Duration::from_secs(5),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4.1-mini");
    }
}
