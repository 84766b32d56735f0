//! Ollama completion provider (`/api/generate`, non-streaming).

use super::{GenerationOptions, TextGenerator};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

pub struct OllamaGenerator {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    /// `client` should carry the request timeout.
    pub fn new(client: reqwest::Client, base_url: &str, model: &str) -> Self {
        Self {
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> anyhow::Result<String> {
        debug!("Sending prompt to Ollama: model={}, {} chars", self.model, prompt.len());

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: ModelOptions {
                temperature: options.temperature,
                num_ctx: options.max_context,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        info!(
            "Ollama response: {} chars ({} tokens)",
            body.response.len(),
            body.eval_count.unwrap_or_default()
        );
        Ok(body.response.trim().to_string())
    }
}
