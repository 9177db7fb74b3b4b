use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "samfkurator";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_run_log_path")]
    pub run_log_path: String,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub daily: DailyConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default = "default_sites")]
    pub sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "ProviderConfig::gemini")]
    pub gemini: ProviderConfig,
    #[serde(default = "ProviderConfig::deepseek")]
    pub deepseek: ProviderConfig,
    #[serde(default = "ProviderConfig::claude")]
    pub claude: ProviderConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// Settings for a hosted provider. `api_key` wins over the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            api_key: None,
            base_url: None,
        }
    }

    fn gemini() -> Self {
        Self::with_model("gemini-2.0-flash")
    }

    fn deepseek() -> Self {
        Self::with_model("deepseek-chat")
    }

    fn claude() -> Self {
        Self::with_model("claude-haiku-4-5-20251001")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Articles scoring below this are discarded without being stored.
    #[serde(default = "default_min_score")]
    pub min_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(default = "default_daily_count")]
    pub count: usize,
    #[serde(default = "default_max_per_discipline")]
    pub max_per_discipline: usize,
    #[serde(default = "default_min_per_side")]
    pub min_primary_source: usize,
    #[serde(default = "default_min_per_side")]
    pub min_secondary_source: usize,
    /// Source names counted as primary (domestic) by the daily selection.
    #[serde(default = "default_primary_sources")]
    pub primary_sources: Vec<String>,
}

impl DailyConfig {
    pub fn is_primary(&self, source_name: &str) -> bool {
        self.primary_sources.iter().any(|s| s == source_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Random delay bounds between article reads, in seconds.
    #[serde(default = "default_article_delay")]
    pub article_delay_secs: (f64, f64),
    /// Random delay bounds between sites, in seconds.
    #[serde(default = "default_source_delay")]
    pub source_delay_secs: (f64, f64),
    /// Upper bound of the random delay before a scheduled run. 0 disables it.
    #[serde(default = "default_jitter_minutes")]
    pub startup_jitter_minutes: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Articles from this site are marked as paywalled.
    #[serde(default)]
    pub paywall: bool,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("samfkurator.db").to_string_lossy().to_string()
}

fn default_run_log_path() -> String {
    data_dir().join("runs.jsonl").to_string_lossy().to_string()
}

fn default_backend() -> String {
    "gemini".to_string()
}

fn default_ollama_model() -> String {
    "llama3:8b".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_temperature() -> f32 {
    0.3
}

fn default_min_score() -> u8 {
    4
}

fn default_daily_count() -> usize {
    10
}

fn default_max_per_discipline() -> usize {
    3
}

fn default_min_per_side() -> usize {
    2
}

fn default_primary_sources() -> Vec<String> {
    ["DR Nyheder", "TV2 Nyheder", "Politiken", "Berlingske", "Jyllands-Posten"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_article_delay() -> (f64, f64) {
    (1.0, 3.0)
}

fn default_source_delay() -> (f64, f64) {
    (3.0, 8.0)
}

fn default_jitter_minutes() -> u32 {
    20
}

fn default_request_timeout() -> u64 {
    30
}

fn default_language() -> String {
    "da".to_string()
}

fn default_sites() -> Vec<SiteConfig> {
    [
        ("DR Nyheder", "https://www.dr.dk/nyheder", "da", false),
        ("TV2 Nyheder", "https://nyheder.tv2.dk", "da", false),
        ("Politiken", "https://politiken.dk", "da", true),
        ("BBC News", "https://feeds.bbci.co.uk/news/world/rss.xml", "en", false),
        ("The Guardian", "https://www.theguardian.com/world/rss", "en", false),
    ]
    .into_iter()
    .map(|(name, url, language, paywall)| SiteConfig {
        name: name.to_string(),
        url: url.to_string(),
        language: language.to_string(),
        paywall,
    })
    .collect()
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            gemini: ProviderConfig::gemini(),
            deepseek: ProviderConfig::deepseek(),
            claude: ProviderConfig::claude(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: default_ollama_model(),
            base_url: default_ollama_url(),
            temperature: default_ollama_temperature(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
        }
    }
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            count: default_daily_count(),
            max_per_discipline: default_max_per_discipline(),
            min_primary_source: default_min_per_side(),
            min_secondary_source: default_min_per_side(),
            primary_sources: default_primary_sources(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            article_delay_secs: default_article_delay(),
            source_delay_secs: default_source_delay(),
            startup_jitter_minutes: default_jitter_minutes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PacingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_log_path: default_run_log_path(),
            ai: AiConfig::default(),
            scoring: ScoringConfig::default(),
            daily: DailyConfig::default(),
            pacing: PacingConfig::default(),
            sites: default_sites(),
        }
    }
}

impl Config {
    /// Load the config from `path` (or the default location), writing the
    /// defaults there on first use. `DATABASE_PATH` overrides `db_path`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        if let Ok(db_path) = std::env::var("DATABASE_PATH") {
            if !db_path.is_empty() {
                config.db_path = db_path;
            }
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if !(1..=10).contains(&self.scoring.min_score) {
            return Err(AppError::Config(format!(
                "scoring.min_score must be within 1..=10, got {}",
                self.scoring.min_score
            )));
        }
        for (name, (min, max)) in [
            ("pacing.article_delay_secs", self.pacing.article_delay_secs),
            ("pacing.source_delay_secs", self.pacing.source_delay_secs),
        ] {
            if min < 0.0 || max < min {
                return Err(AppError::Config(format!(
                    "{name} must be [min, max] with 0 <= min <= max, got [{min}, {max}]"
                )));
            }
        }
        Ok(())
    }
}
