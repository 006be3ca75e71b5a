//! Runtime configuration for the sync core.
//!
//! # Responsibility
//! - Hold the People API endpoint, paging and timeout settings.
//! - Hold the suggestion threshold and the photo directory.
//!
//! # Invariants
//! - A validated config always has a non-blank base URL, a non-zero timeout
//!   and a threshold inside `[0, 1]`.
//! - The effective page size is always inside `1..=1000`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_PEOPLE_API_BASE_URL: &str = "https://people.googleapis.com/v1";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SUGGESTION_THRESHOLD: f64 = 0.5;

const ENV_BASE_URL: &str = "CIRCLE_PEOPLE_API_BASE_URL";
const ENV_PAGE_SIZE: &str = "CIRCLE_PEOPLE_PAGE_SIZE";
const ENV_PHOTO_DIR: &str = "CIRCLE_PHOTO_DIR";

/// People API connection settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PeopleApiConfig {
    pub base_url: String,
    /// Requested page size; clamped by [`PeopleApiConfig::effective_page_size`].
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for PeopleApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PEOPLE_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PeopleApiConfig {
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Entity resolution settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum confidence for a suggestion to be surfaced (inclusive).
    pub suggestion_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            suggestion_threshold: DEFAULT_SUGGESTION_THRESHOLD,
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub people_api: PeopleApiConfig,
    pub matching: MatchConfig,
    /// Directory for downloaded contact photos.
    pub photo_dir: Option<PathBuf>,
}

/// Configuration parse and validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    BlankBaseUrl,
    ZeroTimeout,
    InvalidThreshold(f64),
    InvalidEnv { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::BlankBaseUrl => write!(f, "people_api.base_url cannot be blank"),
            Self::ZeroTimeout => write!(f, "people_api.timeout_secs must be greater than zero"),
            Self::InvalidThreshold(value) => {
                write!(f, "matching.suggestion_threshold must be within [0, 1], got {value}")
            }
            Self::InvalidEnv { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing keys fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `CIRCLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`; blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(base_url) = read(ENV_BASE_URL) {
            config.people_api.base_url = base_url;
        }
        if let Some(raw) = read(ENV_PAGE_SIZE) {
            config.people_api.page_size =
                raw.parse::<u32>().map_err(|_| ConfigError::InvalidEnv {
                    key: ENV_PAGE_SIZE,
                    value: raw.clone(),
                })?;
        }
        if let Some(photo_dir) = read(ENV_PHOTO_DIR) {
            config.photo_dir = Some(PathBuf::from(photo_dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.people_api.base_url.trim().is_empty() {
            return Err(ConfigError::BlankBaseUrl);
        }
        if self.people_api.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let threshold = self.matching.suggestion_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_PEOPLE_API_BASE_URL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.people_api.base_url, DEFAULT_PEOPLE_API_BASE_URL);
        assert_eq!(config.people_api.effective_page_size(), 100);
        assert_eq!(config.matching.suggestion_threshold, 0.5);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config = CoreConfig::from_json_str(
            r#"{ "people_api": { "page_size": 5000 }, "photo_dir": "/var/photos" }"#,
        )
        .unwrap();
        assert_eq!(config.people_api.effective_page_size(), 1000);
        assert_eq!(config.people_api.timeout_secs, 30);
        assert_eq!(config.photo_dir, Some(PathBuf::from("/var/photos")));
    }

    #[test]
    fn zero_page_size_clamps_to_one() {
        let config = CoreConfig::from_json_str(r#"{ "people_api": { "page_size": 0 } }"#).unwrap();
        assert_eq!(config.people_api.effective_page_size(), 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{ "people_api": { "base_url": "  " } }"#),
            Err(ConfigError::BlankBaseUrl)
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{ "people_api": { "timeout_secs": 0 } }"#),
            Err(ConfigError::ZeroTimeout)
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{ "matching": { "suggestion_threshold": 1.5 } }"#),
            Err(ConfigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn lookup_overlays_environment_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CIRCLE_PEOPLE_API_BASE_URL", "http://127.0.0.1:9000/v1"),
            ("CIRCLE_PEOPLE_PAGE_SIZE", "25"),
            ("CIRCLE_PHOTO_DIR", "  "),
        ]);
        let config =
            CoreConfig::from_lookup(|key| env.get(key).map(|value| value.to_string())).unwrap();
        assert_eq!(config.people_api.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.people_api.page_size, 25);
        assert_eq!(config.photo_dir, None);
    }

    #[test]
    fn lookup_rejects_non_numeric_page_size() {
        let result = CoreConfig::from_lookup(|key| {
            (key == "CIRCLE_PEOPLE_PAGE_SIZE").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }
}
