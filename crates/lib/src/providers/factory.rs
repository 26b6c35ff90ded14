//! # AI Provider Factory
//!
//! This module centralizes the logic for creating AI provider instances from a
//! [`ProviderConfig`], so every consumer (CLI, tests, other crates) builds
//! providers the same way.

use crate::{
    config::{ConfigError, ProviderConfig, ProviderKind},
    providers::ai::{
        gemini::{gemini_api_url, GeminiProvider},
        openai::{OpenAiProvider, OPENAI_CHAT_COMPLETIONS_URL},
        AiProvider,
    },
};
use reqwest::Client as ReqwestClient;
use std::sync::Arc;
use tracing::info;

/// Creates an AI provider that shares the given HTTP client.
pub fn create_provider(
    config: &ProviderConfig,
    client: ReqwestClient,
) -> Result<Arc<dyn AiProvider>, ConfigError> {
    info!(
        "Configuring '{}' provider with model '{}'",
        config.provider, config.model_name
    );

    let provider: Arc<dyn AiProvider> = match config.provider {
        ProviderKind::Gemini => {
            let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey(
                "AI_API_KEY or GEMINI_API_KEY",
                ProviderKind::Gemini,
            ))?;
            let api_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| gemini_api_url(&config.model_name));
            Arc::new(GeminiProvider::with_client(client, api_url, api_key))
        }
        ProviderKind::OpenAi => {
            let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey(
                "AI_API_KEY or OPENAI_API_KEY",
                ProviderKind::OpenAi,
            ))?;
            let api_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| OPENAI_CHAT_COMPLETIONS_URL.to_string());
            Arc::new(OpenAiProvider::with_client(
                client,
                api_url,
                Some(api_key),
                Some(config.model_name.clone()),
            ))
        }
        ProviderKind::Local => {
            let api_url = config.api_url.clone().ok_or(ConfigError::MissingApiUrl)?;
            Arc::new(OpenAiProvider::with_client(
                client,
                api_url,
                config.api_key.clone(),
                Some(config.model_name.clone()),
            ))
        }
    };

    Ok(provider)
}
