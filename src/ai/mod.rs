//! Scoring backends.
//!
//! Every provider implements [`ScoringBackend::complete`], a single
//! system-prompt + user-prompt round trip returning raw model text. Skimming
//! and deep-read scoring are built on top of it here, so prompt construction,
//! parsing and failure semantics are identical across providers.

mod claude;
mod deepseek;
mod gemini;
mod ollama;
pub mod prompt;
mod registry;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{truncate_chars, Article, Candidate, ScoringResult};

pub use claude::ClaudeBackend;
pub use deepseek::DeepSeekBackend;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use registry::{create_backend, BackendKind};

/// Largest candidate batch a single skim call accepts.
pub const MAX_SKIM_BATCH: usize = 60;

/// Optional capabilities, fixed when the backend is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports batched headline skimming. Without it skim is the identity filter.
    pub skim: bool,
    /// Has a meaningful reachability check (self-hosted backends).
    pub preflight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Skim,
    Score,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub purpose: Purpose,
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<'a> CompletionRequest<'a> {
    pub fn skim(prompt: &'a str) -> Self {
        Self {
            purpose: Purpose::Skim,
            system: prompt::SKIM_SYSTEM_PROMPT,
            prompt,
            temperature: 0.1,
            max_tokens: 200,
        }
    }

    pub fn score(prompt: &'a str) -> Self {
        Self {
            purpose: Purpose::Score,
            system: prompt::DEEP_READ_SYSTEM_PROMPT,
            prompt,
            temperature: 0.2,
            max_tokens: 500,
        }
    }
}

#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Identifier recorded in `ScoringResult::backend_used`.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// One prompt round trip. Implementations ask for JSON output where the
    /// provider supports it and return the raw text.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;

    /// Reachability check. Hosted backends fail lazily per call instead.
    async fn is_available(&self) -> bool {
        true
    }

    /// Positions of the candidates worth a deep read, ascending and unique.
    async fn skim(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
        if !self.capabilities().skim || candidates.is_empty() {
            return Ok((0..candidates.len()).collect());
        }

        let batch = &candidates[..candidates.len().min(MAX_SKIM_BATCH)];
        let prompt = prompt::build_skim_prompt(batch);
        let raw = self.complete(&CompletionRequest::skim(&prompt)).await?;
        let indices = prompt::parse_skim_response(&raw, batch.len())?;

        debug!(
            backend = self.name(),
            headlines = batch.len(),
            selected = indices.len(),
            "Skim complete"
        );
        Ok(indices)
    }

    /// Score one article. Any failure is logged and yields `None`.
    async fn score_article(&self, article: &Article) -> Option<ScoringResult> {
        let prompt = prompt::build_deep_read_prompt(article);

        let raw = match self.complete(&CompletionRequest::score(&prompt)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(backend = self.name(), url = %article.url, error = %e, "Scoring call failed");
                return None;
            }
        };

        match prompt::parse_scoring_response(&raw, &article.url, self.name()) {
            Ok(result) => {
                if !result.primary_discipline.is_known() {
                    warn!(
                        backend = self.name(),
                        url = %article.url,
                        discipline = %result.primary_discipline.as_str(),
                        "Backend returned an unknown primary discipline"
                    );
                }
                Some(result)
            }
            Err(e) => {
                warn!(
                    backend = self.name(),
                    url = %article.url,
                    error = %e,
                    response_preview = %truncate_chars(&raw, 300),
                    "Model returned non-conforming JSON; skipping article"
                );
                None
            }
        }
    }
}

/// Read the error body of a failed provider call into an `AppError`.
pub(crate) async fn api_error(backend: &'static str, response: reqwest::Response) -> crate::error::AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    crate::error::AppError::BackendApi {
        backend,
        message: format!("HTTP {status}: {}", truncate_chars(&body, 500)),
    }
}

/// Shared HTTP client for provider calls.
pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?)
}
