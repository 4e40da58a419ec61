//! Configuration file parser for `<data dir>/config.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings so typos show up.
use crate::sync::SyncSettings;
use crate::util::DEFAULT_USER_AGENT;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level pipeline configuration.
///
/// Every field has a default so any subset of keys can be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Articles kept per source, newest first; favorites are exempt (0 = unlimited).
    pub max_articles_per_source: u64,

    /// Days an article is kept after publication; favorites are exempt (0 = unlimited).
    pub max_article_age_days: u64,

    pub feed_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub image_timeout_secs: u64,

    /// Sources synchronized at once by `sync` without `--source`.
    pub max_concurrent_syncs: usize,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_articles_per_source: 50,
            max_article_age_days: 30,
            feed_timeout_secs: 10,
            page_timeout_secs: 30,
            image_timeout_secs: 30,
            max_concurrent_syncs: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "max_articles_per_source",
        "max_article_age_days",
        "feed_timeout_secs",
        "page_timeout_secs",
        "image_timeout_secs",
        "max_concurrent_syncs",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            max_articles = config.max_articles_per_source,
            max_age_days = config.max_article_age_days,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Per-cycle settings for the synchronizer.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_articles_per_source: self.max_articles_per_source,
            max_article_age_days: self.max_article_age_days,
            feed_timeout: Duration::from_secs(self.feed_timeout_secs),
            page_timeout: Duration::from_secs(self.page_timeout_secs),
            image_timeout: Duration::from_secs(self.image_timeout_secs),
            max_concurrent_syncs: self.max_concurrent_syncs.max(1),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_articles_per_source, 50);
        assert_eq!(config.max_article_age_days, 30);
        assert_eq!(config.feed_timeout_secs, 10);
        assert_eq!(config.page_timeout_secs, 30);
        assert_eq!(config.max_concurrent_syncs, 4);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_articles_per_source, 50);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (_dir, path) = write_config("   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_article_age_days, 30);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (_dir, path) = write_config("max_articles_per_source = 0\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_articles_per_source, 0);
        assert_eq!(config.max_article_age_days, 30);
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"
max_articles_per_source = 200
max_article_age_days = 7
feed_timeout_secs = 5
page_timeout_secs = 20
image_timeout_secs = 15
max_concurrent_syncs = 8
user_agent = "reader/1.0"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_articles_per_source, 200);
        assert_eq!(config.max_article_age_days, 7);
        assert_eq!(config.user_agent, "reader/1.0");

        let settings = config.sync_settings();
        assert_eq!(settings.feed_timeout, Duration::from_secs(5));
        assert_eq!(settings.page_timeout, Duration::from_secs(20));
        assert_eq!(settings.image_timeout, Duration::from_secs(15));
        assert_eq!(settings.max_concurrent_syncs, 8);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let (_dir, path) = write_config("max_concurrent_syncs = 0\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sync_settings().max_concurrent_syncs, 1);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (_dir, path) = write_config("this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (_dir, path) = write_config("theme = \"dark\"\nmax_article_age_days = 3\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_article_age_days, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (_dir, path) = write_config("max_articles_per_source = \"many\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (_dir, path) = write_config(&"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }
}
