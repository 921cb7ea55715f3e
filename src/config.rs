use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,

    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub llm_timeout_secs: u64,

    pub slack_bot_token: Option<String>,
    pub slack_api_url: String,
    pub messages_per_second: u32,

    /// Operating timezone for day and week boundaries.
    pub utc_offset_hours: i32,
    pub target_language: String,

    pub similarity_threshold: f64,
    pub enrich_concurrency: usize,
    pub enrich_timeout_secs: u64,
    pub search_delay_ms: u64,
    pub company_timeout_secs: u64,

    pub collection_interval_minutes: u32,
    pub daily_report_hour: u32,
    pub weekly_report_hour: u32,

    pub delivery_max_attempts: u32,
    pub delivery_backoff_base_ms: u64,
    pub default_retry_after_secs: u64,
    pub max_rate_limit_waits: u32,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rival-watch");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("rival-watch.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            anthropic_api_key: None,
            anthropic_model: "claude-3-5-haiku-20241022".to_string(),
            llm_timeout_secs: 60,
            slack_bot_token: None,
            slack_api_url: "https://slack.com/api".to_string(),
            messages_per_second: 1,
            utc_offset_hours: 9,
            target_language: "Korean".to_string(),
            similarity_threshold: 0.8,
            enrich_concurrency: 5,
            enrich_timeout_secs: 45,
            search_delay_ms: 1000,
            company_timeout_secs: 600,
            collection_interval_minutes: 180,
            daily_report_hour: 9,
            weekly_report_hour: 10,
            delivery_max_attempts: 3,
            delivery_backoff_base_ms: 1000,
            default_retry_after_secs: 30,
            max_rate_limit_waits: 5,
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.anthropic_api_key = Some(key);
        }
        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            config.slack_bot_token = Some(token);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rival-watch")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Config(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if self.daily_report_hour > 23 || self.weekly_report_hour > 23 {
            return Err(AppError::Config("report hours must be within 0..=23".into()));
        }
        if self.delivery_max_attempts == 0 {
            return Err(AppError::Config("delivery_max_attempts must be at least 1".into()));
        }
        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("invalid utc_offset_hours: {}", self.utc_offset_hours))
        })
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_secs(self.enrich_timeout_secs)
    }

    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }

    pub fn company_timeout(&self) -> Duration {
        Duration::from_secs(self.company_timeout_secs)
    }
}
