//! Generative text providers.
//!
//! The fallback mapper only needs "prompt in, text out". Providers are
//! unreliable by assumption: every error is returned, never panicked on, and
//! the caller decides how to degrade.

pub mod ollama;
pub mod openrouter;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Settings;

/// Sampling options for a single completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Context window (or output budget for hosted chat models).
    pub max_context: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_context: 4096,
        }
    }
}

/// Async trait implemented by each generative backend.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> anyhow::Result<String>;
}

/// Known provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Ollama,
    OpenRouter,
}

impl GeneratorKind {
    /// Parse a configuration string into a provider kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ollama" => Some(Self::Ollama),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }
}

/// Build the configured generator, or `None` when the fallback is disabled.
pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Arc<dyn TextGenerator>>> {
    if !settings.use_llm {
        info!("Generative fallback disabled (USE_LLM=false)");
        return Ok(None);
    }
    let client = reqwest::Client::builder()
        .timeout(settings.llm_timeout)
        .build()
        .context("Failed to build LLM HTTP client")?;

    let generator: Arc<dyn TextGenerator> = match settings.llm_provider {
        GeneratorKind::Ollama => Arc::new(ollama::OllamaGenerator::new(
            client,
            &settings.ollama_url,
            &settings.llm_model,
        )),
        GeneratorKind::OpenRouter => {
            let api_key = settings
                .openrouter_api_key
                .clone()
                .context("OPENROUTER_API_KEY environment variable not set")?;
            Arc::new(
                openrouter::OpenRouterClient::new(client, api_key).with_model(&settings.llm_model),
            )
        }
    };
    info!("Generative fallback: {} ({})", generator.name(), settings.llm_model);
    Ok(Some(generator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(GeneratorKind::from_str("ollama"), Some(GeneratorKind::Ollama));
        assert_eq!(GeneratorKind::from_str("openrouter"), Some(GeneratorKind::OpenRouter));
        assert_eq!(GeneratorKind::from_str("phi"), None);
    }

    #[test]
    fn test_disabled_generator() {
        let settings = Settings {
            use_llm: false,
            ..Settings::default()
        };
        assert!(from_settings(&settings).unwrap().is_none());
    }

    #[test]
    fn test_openrouter_requires_key() {
        let settings = Settings {
            llm_provider: GeneratorKind::OpenRouter,
            ..Settings::default()
        };
        assert!(from_settings(&settings).is_err());
    }

    #[test]
    fn test_ollama_generator_built() {
        let generator = from_settings(&Settings::default()).unwrap().unwrap();
        assert_eq!(generator.name(), "ollama");
    }
}
