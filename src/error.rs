use thiserror::Error;

use crate::services::ChatError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Language model API error: {0}")]
    Llm(String),

    #[error("Chat API error: {0}")]
    Chat(#[from] ChatError),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Similarity scoring failed: {0}")]
    Similarity(String),

    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    #[error("Collection failed for {company}: {message}")]
    Collection { company: String, message: String },

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("No destination configured: {0}")]
    Configuration(String),
}

impl AppError {
    /// Short, stable identifier stored in log rows.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Http(_) => "http",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Toml(_) | AppError::Config(_) => "config",
            AppError::Llm(_) => "llm",
            AppError::Chat(ChatError::RateLimited { .. }) => "rate_limited",
            AppError::Chat(_) => "chat",
            AppError::Fetch { .. } => "fetch",
            AppError::Similarity(_) => "similarity",
            AppError::Enrichment(_) => "enrichment",
            AppError::Collection { .. } => "collection",
            AppError::Delivery(_) => "delivery",
            AppError::Configuration(_) => "configuration",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
