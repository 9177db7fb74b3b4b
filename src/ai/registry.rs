use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AiConfig, ProviderConfig};
use crate::error::{AppError, Result};

use super::{ClaudeBackend, DeepSeekBackend, GeminiBackend, OllamaBackend, ScoringBackend};

/// The closed set of scoring backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Gemini,
    DeepSeek,
    Claude,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Gemini => "gemini",
            BackendKind::DeepSeek => "deepseek",
            BackendKind::Claude => "claude",
            BackendKind::Ollama => "ollama",
        }
    }

    /// Environment variable holding the credential, if one is required.
    pub fn credential_var(&self) -> Option<&'static str> {
        match self {
            BackendKind::Gemini => Some("GEMINI_API_KEY"),
            BackendKind::DeepSeek => Some("DEEPSEEK_API_KEY"),
            BackendKind::Claude => Some("ANTHROPIC_API_KEY"),
            BackendKind::Ollama => None,
        }
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(BackendKind::Gemini),
            "deepseek" => Ok(BackendKind::DeepSeek),
            "claude" => Ok(BackendKind::Claude),
            "ollama" | "local" => Ok(BackendKind::Ollama),
            _ => Err(AppError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the backend, reading credentials from config or the process environment.
pub fn create_backend(
    kind: BackendKind,
    config: &AiConfig,
    timeout: Duration,
) -> Result<Arc<dyn ScoringBackend>> {
    create_backend_with(kind, config, timeout, |var| std::env::var(var).ok())
}

/// Like [`create_backend`] with an explicit environment lookup.
pub fn create_backend_with<F>(
    kind: BackendKind,
    config: &AiConfig,
    timeout: Duration,
    env: F,
) -> Result<Arc<dyn ScoringBackend>>
where
    F: Fn(&str) -> Option<String>,
{
    let credential = |provider: &ProviderConfig| -> Result<String> {
        let var = kind.credential_var().unwrap_or_default();
        provider
            .api_key
            .clone()
            .or_else(|| env(var))
            .filter(|key| !key.trim().is_empty())
            .ok_or(AppError::MissingCredential {
                backend: kind.as_str(),
                var,
            })
    };

    let backend: Arc<dyn ScoringBackend> = match kind {
        BackendKind::Gemini => {
            let provider = &config.gemini;
            let backend = GeminiBackend::new(credential(provider)?, provider.model.clone(), timeout)?;
            Arc::new(match &provider.base_url {
                Some(url) => backend.with_base_url(url),
                None => backend,
            })
        }
        BackendKind::DeepSeek => {
            let provider = &config.deepseek;
            let backend = DeepSeekBackend::new(credential(provider)?, provider.model.clone(), timeout)?;
            Arc::new(match &provider.base_url {
                Some(url) => backend.with_base_url(url),
                None => backend,
            })
        }
        BackendKind::Claude => {
            let provider = &config.claude;
            let backend = ClaudeBackend::new(credential(provider)?, provider.model.clone(), timeout)?;
            Arc::new(match &provider.base_url {
                Some(url) => backend.with_base_url(url),
                None => backend,
            })
        }
        BackendKind::Ollama => {
            let ollama = &config.ollama;
            Arc::new(OllamaBackend::new(
                &ollama.base_url,
                ollama.model.clone(),
                ollama.temperature,
                // Local models are slow; give them more room than hosted APIs.
                timeout.max(Duration::from_secs(120)),
            )?)
        }
    };

    tracing::debug!(backend = backend.name(), "Scoring backend ready");
    Ok(backend)
}
