//! `[provider]` configuration section and its conversion into a `ModelProvider`.

use crate::error::ProviderError;
use crate::provider::{CompletionOptions, ModelProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Ollama => "ollama",
        }
    }

    fn requires_api_key(self) -> bool {
        !matches!(self, ProviderType::Ollama)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    #[serde(default = "default_model")]
    pub model: String,

    /// Falls back to the provider's conventional environment variable when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL override (Groq, Azure, a local gateway, a remote Ollama)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

fn default_provider_type() -> ProviderType {
    ProviderType::OpenAI
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_json_mode() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: None,
            json_mode: default_json_mode(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if let Some(0) = self.max_tokens {
            return Err("max_tokens must be greater than zero".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "Endpoint must start with http:// or https://, got '{}'",
                    endpoint
                ));
            }
        }
        Ok(())
    }

    /// Environment variables consulted, in order, when no key is configured.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self.provider_type {
            ProviderType::OpenAI => {
                let is_groq = self
                    .endpoint
                    .as_deref()
                    .map(|e| e.contains("groq"))
                    .unwrap_or(false);
                if is_groq {
                    &["GROQ_API_KEY", "OPENAI_API_KEY"]
                } else {
                    &["OPENAI_API_KEY", "GROQ_API_KEY"]
                }
            }
            ProviderType::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderType::Ollama => &[],
        }
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.api_key_env_vars()
                    .iter()
                    .filter_map(|name| lookup(name))
                    .find(|key| !key.trim().is_empty())
            })
    }

    pub fn to_model_provider(&self) -> Result<ModelProvider, ProviderError> {
        self.to_model_provider_with(self.resolve_api_key())
    }

    fn to_model_provider_with(&self, api_key: Option<String>) -> Result<ModelProvider, ProviderError> {
        let model = self.model.clone();
        let base_url = self.endpoint.clone();
        if self.provider_type.requires_api_key() && api_key.is_none() {
            return Err(ProviderError::Auth(format!(
                "No API key configured for provider '{}' (set provider.api_key or one of: {})",
                self.provider_type.as_str(),
                self.api_key_env_vars().join(", ")
            )));
        }
        let api_key = api_key.unwrap_or_default();

        Ok(match self.provider_type {
            ProviderType::OpenAI => ModelProvider::OpenAI {
                model,
                api_key,
                base_url,
            },
            ProviderType::Anthropic => ModelProvider::Anthropic {
                model,
                api_key,
                base_url,
            },
            ProviderType::Ollama => ModelProvider::Ollama { model, base_url },
        })
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            json_mode: self.json_mode,
        }
    }
}
