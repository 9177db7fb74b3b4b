use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::{api_error, http_client, Capabilities, CompletionRequest, Purpose, ScoringBackend};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Self-hosted Ollama server. Deep-read only, with a reachability preflight.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: String, temperature: f32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
        })
    }
}

#[async_trait]
impl ScoringBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            skim: false,
            preflight: true,
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let temperature = match request.purpose {
            Purpose::Score => self.temperature,
            Purpose::Skim => request.temperature,
        };
        let body = GenerateRequest {
            model: &self.model,
            system: request.system,
            prompt: request.prompt,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(self.name(), response).await);
        }

        let generated: GenerateResponse = response.json().await?;
        Ok(generated.response)
    }

    async fn is_available(&self) -> bool {
        match self.client.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "Ollama not reachable");
                false
            }
        }
    }
}
