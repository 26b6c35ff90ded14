//! # Model Provider Configuration
//!
//! Typed configuration for selecting and authenticating a model provider.
//! Values usually come from the environment (optionally loaded from a `.env`
//! file); the CLI binds them to flags.

use serde::Deserialize;
use std::{env, fmt, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unsupported AI provider '{0}'. Expected 'openai', 'gemini' or 'local'.")]
    UnknownProvider(String),
    #[error("{0} must be set to use the '{1}' provider")]
    MissingApiKey(&'static str, ProviderKind),
    #[error("AI_API_URL must be set to use the 'local' provider")]
    MissingApiUrl,
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// The family of model API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
    /// Any OpenAI-compatible server, such as a local model runner.
    Local,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::Local => "gpt-4o",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// The provider-specific variable consulted when `AI_API_KEY` is unset.
    pub fn api_key_variable(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::Local => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "local" => Ok(ProviderKind::Local),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// A resolved configuration for one AI provider instance.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    /// Optional for providers whose URL can be derived from the model name.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Can be absent for local providers.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

impl ProviderConfig {
    /// Fills in defaults for anything not given explicitly: the model name
    /// falls back to the provider default and the API key to the
    /// provider-specific environment variable.
    pub fn resolve(
        provider: ProviderKind,
        model_name: Option<String>,
        api_url: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .or_else(|| env::var(provider.api_key_variable()).ok())
            .filter(|k| !k.is_empty());
        Self {
            provider,
            api_url: api_url.filter(|u| !u.is_empty()),
            api_key,
            model_name: model_name
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| provider.default_model().to_string()),
        }
    }
}

/// Loads a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}
