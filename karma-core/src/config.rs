use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SUBREDDITS: [&str; 10] = [
    "AskReddit",
    "offmychest",
    "explainlikeimfive",
    "relationships",
    "relationship_advice",
    "AmItheAsshole",
    "personalfinance",
    "legaladvice",
    "AskScience",
    "AskHistorians",
];

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; karma-text-project/0.1; +https://example.com)";

/// Largest page the listing endpoint will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub subreddits: Vec<String>,
    pub max_total_posts: usize,
    pub min_age_days: u32,
    pub requests_per_second: f64,
    pub output_path: PathBuf,
    pub user_agent: String,
    pub api_base_url: String,
    pub listing_sort: String,
    pub time_window: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            max_total_posts: 10_000,
            min_age_days: 30,
            requests_per_second: 0.5,
            output_path: PathBuf::from("reddit_text_karma_dataset.csv"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_base_url: "https://www.reddit.com".to_string(),
            listing_sort: "top".to_string(),
            time_window: "year".to_string(),
            page_size: MAX_PAGE_SIZE,
            request_timeout_secs: 15,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Defaults, then the optional file, then `KARMA_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("KARMA_OUTPUT_PATH") {
            debug!("KARMA_OUTPUT_PATH override: {}", path);
            self.output_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("KARMA_MAX_TOTAL_POSTS") {
            self.max_total_posts = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "KARMA_MAX_TOTAL_POSTS".to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("KARMA_MIN_AGE_DAYS") {
            self.min_age_days = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "KARMA_MIN_AGE_DAYS".to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(agent) = lookup("KARMA_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(raw) = lookup("KARMA_SUBREDDITS") {
            self.subreddits = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one subreddit is required".to_string(),
            });
        }
        if let Some(bad) = self.subreddits.iter().find(|s| !is_valid_subreddit_name(s)) {
            return Err(ConfigError::InvalidValue {
                field: "subreddits".to_string(),
                value: bad.clone(),
            });
        }
        if self.max_total_posts == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "max_total_posts must be greater than zero".to_string(),
            });
        }
        if !self.requests_per_second.is_finite() || self.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "requests_per_second".to_string(),
                value: self.requests_per_second.to_string(),
            });
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: self.page_size.to_string(),
            });
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "user_agent must not be empty".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Gap enforced between consecutive page requests.
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Newest creation time (epoch seconds) a post may have to be collected.
    pub fn created_cutoff(&self, now: DateTime<Utc>) -> f64 {
        created_cutoff(now, self.min_age_days)
    }
}

pub fn created_cutoff(now: DateTime<Utc>, min_age_days: u32) -> f64 {
    let cutoff = now - chrono::Duration::days(i64::from(min_age_days));
    cutoff.timestamp_millis() as f64 / 1000.0
}

fn is_valid_subreddit_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_collection_plan() {
        let config = AppConfig::default();
        assert_eq!(config.subreddits.len(), 10);
        assert_eq!(config.subreddits[0], "AskReddit");
        assert_eq!(config.max_total_posts, 10_000);
        assert_eq!(config.min_age_days, 30);
        assert_eq!(config.request_interval(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_created_cutoff() {
        let now = DateTime::parse_from_rfc3339("2024-03-31T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let config = AppConfig::default();
        let expected = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .timestamp() as f64;
        assert_eq!(config.created_cutoff(now), expected);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            subreddits = ["rust", "learnrust"]
            max_total_posts = 50
            output_path = "out/posts.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.subreddits, vec!["rust", "learnrust"]);
        assert_eq!(config.max_total_posts, 50);
        assert_eq!(config.output_path, PathBuf::from("out/posts.csv"));
        assert_eq!(config.min_age_days, 30);
        assert_eq!(config.listing_sort, "top");
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = AppConfig::from_toml_str("max_total_posts = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let result = AppConfig::from_file(Path::new("/nonexistent/karma.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("KARMA_OUTPUT_PATH", "/tmp/karma.csv"),
            ("KARMA_MAX_TOTAL_POSTS", "250"),
            ("KARMA_SUBREDDITS", "rust, golang ,,"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.output_path, PathBuf::from("/tmp/karma.csv"));
        assert_eq!(config.max_total_posts, 250);
        assert_eq!(config.subreddits, vec!["rust", "golang"]);
    }

    #[test]
    fn test_bad_numeric_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "KARMA_MAX_TOTAL_POSTS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.subreddits.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.subreddits = vec!["not a sub".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.requests_per_second = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.page_size = 101;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.max_total_posts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
