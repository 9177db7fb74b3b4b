use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Feed parse error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown backend '{0}' (expected one of: gemini, deepseek, claude, ollama, local)")]
    UnknownBackend(String),

    #[error("Backend '{backend}' needs {var} to be set")]
    MissingCredential { backend: &'static str, var: &'static str },

    #[error("{backend} API error: {message}")]
    BackendApi { backend: &'static str, message: String },

    #[error("Backend '{0}' is not reachable")]
    BackendUnavailable(&'static str),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
