use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Read-only configuration snapshot consumed by the components.
///
/// Constructed once (from a TOML file or [`Config::default`]) and passed
/// by reference into each constructor. Nothing mutates it mid-operation.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,
    /// Maximum entry age in days. Absent means entries never expire.
    #[serde(default)]
    pub max_age_days: Option<f64>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: default_cache_dir(),
            max_age_days: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    #[serde(default = "default_window_size")]
    pub default_size: usize,
}

fn default_window_size() -> usize {
    50
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            default_size: default_window_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_per_seconds")]
    pub per_seconds: f64,
}

fn default_max_requests() -> usize {
    3
}

fn default_per_seconds() -> f64 {
    1.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            per_seconds: default_per_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub directory: Option<DirectorySourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectorySourceConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse config file: {}", e)))?;

    if config.window.default_size == 0 {
        return Err(Error::Config("window.default_size must be > 0".into()));
    }

    if config.rate_limit.max_requests == 0 {
        return Err(Error::Config("rate_limit.max_requests must be > 0".into()));
    }

    if config.rate_limit.per_seconds <= 0.0 {
        return Err(Error::Config("rate_limit.per_seconds must be > 0".into()));
    }

    if let Some(age) = config.cache.max_age_days {
        if age < 0.0 {
            return Err(Error::Config("cache.max_age_days must be >= 0".into()));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.directory, PathBuf::from("cache"));
        assert_eq!(config.cache.max_age_days, None);
        assert_eq!(config.window.default_size, 50);
        assert_eq!(config.rate_limit.max_requests, 3);
    }

    #[test]
    fn test_parse_minimal() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.cache.enabled);
        assert!(config.sources.directory.is_none());
    }

    #[test]
    fn test_parse_full() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            enabled = false
            directory = "/tmp/doctree-cache"
            max_age_days = 7.0

            [window]
            default_size = 25

            [rate_limit]
            max_requests = 10
            per_seconds = 2.0

            [sources.directory]
            root = "docs"
            include_globs = ["**/*.md"]
            "#,
        )
        .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_age_days, Some(7.0));
        assert_eq!(config.window.default_size, 25);
        assert_eq!(config.rate_limit.max_requests, 10);
        let dir = config.sources.directory.unwrap();
        assert_eq!(dir.root, PathBuf::from("docs"));
        assert_eq!(dir.include_globs, vec!["**/*.md".to_string()]);
    }

    #[test]
    fn test_rejects_zero_window() {
        let tmp = std::env::temp_dir().join("doctree-bad-config.toml");
        std::fs::write(&tmp, "[window]\ndefault_size = 0\n").unwrap();
        let err = load_config(&tmp).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::fs::remove_file(&tmp).ok();
    }
}
