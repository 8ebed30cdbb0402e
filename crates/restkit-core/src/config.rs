//! Configuration for the resilience core.
//!
//! Settings live in `restkit.toml`. Every section and key is optional; missing
//! values fall back to the defaults shown below.
//!
//! ```toml
//! [batch]
//! max_batch_size = 50           # business limit on items per batch
//! max_concurrent_requests = 5   # technical throttle on in-flight requests
//!
//! [retry]
//! attempts = 3                  # total invocations, first one included
//! min_delay_ms = 1000
//! max_delay_ms = 10000
//! jitter = false
//!
//! [cache]
//! enabled = false
//! max_entries = 1000
//! ttl_seconds = 300
//!
//! [http]
//! timeout_ms = 30000
//! user_agent = "restkit/0.1.0"
//! ```
//!
//! # Resolution Algorithm
//!
//! [`Config::load_resolved`] looks in order at:
//!
//! 1. The `RESTKIT_CONFIG_PATH` environment variable
//! 2. `restkit.toml` in the current directory
//! 3. `restkit.toml` in each parent directory, up to the filesystem root
//! 4. The XDG config directory (`~/.config/restkit/restkit.toml`)
//!
//! A missing file is not an error; the caller falls back to defaults.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RESTKIT_CONFIG_PATH";

/// File name searched for during resolution.
pub const CONFIG_FILE_NAME: &str = "restkit.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error when a config file is malformed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Values parsed but are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub batch: BatchConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
}

/// `[batch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Most operations accepted in one batch call.
    pub max_batch_size: usize,
    /// Most operations in flight at once, independent of batch size.
    pub max_concurrent_requests: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            max_concurrent_requests: 5,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations per logical request, first attempt included.
    pub attempts: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay_ms: 1000,
            max_delay_ms: 10_000,
            jitter: false,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, a no-op cache is used and every read misses.
    pub enabled: bool,
    pub max_entries: u64,
    /// Entry lifetime; `None` keeps entries until evicted for space.
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1000,
            ttl_seconds: Some(300),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-attempt request timeout.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: default_user_agent(),
        }
    }
}

pub(crate) fn default_user_agent() -> String {
    format!("restkit/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The file does not exist (`NotFound`) or cannot be read (`Io`)
    /// - The file cannot be parsed as TOML
    /// - The values fail [`Config::validate`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses and validates config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if the TOML is malformed or the values fail
    /// [`Config::validate`].
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Finds and loads a config file using the resolution algorithm.
    ///
    /// Returns `Ok(None)` when no file exists anywhere on the search path.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - `RESTKIT_CONFIG_PATH` points at a file that does not exist
    /// - The current directory cannot be determined
    /// - A found config file cannot be read, parsed or validated
    pub fn load_resolved() -> Result<Option<(Self, PathBuf)>, ConfigError> {
        // Step 1: explicit override; a dangling override is an error
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
            let config = Self::load(&path)?;
            return Ok(Some((config, path)));
        }

        // Steps 2 and 3: current directory, then its ancestors
        let current = std::env::current_dir()?;
        if let Some(found) = find_in_ancestors(&current)? {
            return Ok(Some(found));
        }

        // Step 4: XDG config directory
        if let Some(path) = dirs::config_dir().map(|dir| dir.join("restkit").join(CONFIG_FILE_NAME))
            && path.is_file()
        {
            let config = Self::load(&path)?;
            return Ok(Some((config, path)));
        }

        Ok(None)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero batch size or concurrency
    /// limit, or a minimum retry delay above the maximum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_batch_size must be at least 1".into(),
            ));
        }
        if self.batch.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "batch.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.min_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                self.retry.min_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }
}

fn find_in_ancestors(start: &Path) -> Result<Option<(Config, PathBuf)>, ConfigError> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            let config = Config::load(&candidate)?;
            return Ok(Some((config, candidate)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.batch.max_batch_size, 50);
        assert_eq!(config.retry.attempts, 3);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r"
            [batch]
            max_concurrent_requests = 2

            [retry]
            attempts = 5
            jitter = true
            ",
        )
        .unwrap();

        assert_eq!(config.batch.max_batch_size, 50);
        assert_eq!(config.batch.max_concurrent_requests, 2);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.retry.min_delay_ms, 1000);
        assert!(config.retry.jitter);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let err = Config::from_toml("[batch]\nmax_concurrent_requests = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let err = Config::from_toml("[retry]\nmin_delay_ms = 500\nmax_delay_ms = 100").unwrap_err();
        assert!(err.to_string().contains("must not exceed"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Config::from_toml("[batch\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let err = Config::load("/definitely/not/here/restkit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_unreadable_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_FILE_NAME);
        fs::create_dir(&dir).unwrap();

        let err = Config::load(&dir).unwrap_err();

        assert!(matches!(err, ConfigError::Io(_)), "{err:?}");
    }

    #[test]
    fn test_find_in_ancestors_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[cache]\nenabled = true\nttl_seconds = 60\n",
        )
        .unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = find_in_ancestors(&nested).unwrap().unwrap();

        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, Some(60));
    }

    #[test]
    fn test_config_serializes_back_to_toml() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        let reparsed = Config::from_toml(&rendered).unwrap();
        assert_eq!(reparsed, Config::default());
    }
}
