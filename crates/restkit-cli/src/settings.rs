//! Config loading and client construction shared by the commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use restkit_core::{Config, RetryStrategy, Transport};
use tracing::debug;

/// Environment variable holding the bearer token when `--token` is absent.
pub const TOKEN_ENV: &str = "RESTKIT_TOKEN";

/// Configuration plus the file it came from (`None` means built-in defaults).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

/// Loads `explicit` if given, otherwise runs the resolution search.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        return Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
        });
    }

    match Config::load_resolved().context("failed to resolve config")? {
        Some((config, path)) => {
            debug!(path = %path.display(), "loaded config");
            Ok(LoadedConfig {
                config,
                source: Some(path),
            })
        }
        None => {
            debug!("no config file found, using defaults");
            Ok(LoadedConfig {
                config: Config::default(),
                source: None,
            })
        }
    }
}

/// `--token` wins over the environment.
pub fn resolve_token(explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .filter(|token| !token.trim().is_empty())
}

pub fn build_transport(
    base_url: &str,
    token: Option<String>,
    config: &Config,
) -> Result<Transport> {
    let mut builder = Transport::builder(base_url)
        .http_config(&config.http)
        .retry(RetryStrategy::from_config(&config.retry));
    if let Some(token) = token {
        builder = builder.bearer_token(token);
    }
    builder.build().context("failed to build HTTP transport")
}

/// Parses `key=value` query arguments.
pub fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("query key must not be empty in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_query_pair() {
        assert_eq!(
            parse_query_pair("state=open").unwrap(),
            ("state".to_string(), "open".to_string())
        );
        assert_eq!(
            parse_query_pair("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_query_pair("novalue").is_err());
        assert!(parse_query_pair("=x").is_err());
    }

    #[test]
    fn test_resolve_token_prefers_explicit() {
        assert_eq!(resolve_token(Some("abc")), Some("abc".to_string()));
        assert_eq!(resolve_token(Some("   ")), None);
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        fs::write(&path, "[batch]\nmax_concurrent_requests = 2\n").unwrap();

        let loaded = load_config(Some(&path)).unwrap();

        assert_eq!(loaded.config.batch.max_concurrent_requests, 2);
        assert_eq!(loaded.source, Some(path));
    }

    #[test]
    fn test_load_config_reports_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(&path, "[batch]\nmax_batch_size = 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();

        assert!(format!("{err:#}").contains("max_batch_size"));
    }

    #[test]
    fn test_build_transport_applies_base_url() {
        let transport =
            build_transport("https://api.example.com/", None, &Config::default()).unwrap();
        assert_eq!(transport.base_url(), "https://api.example.com");
        assert_eq!(transport.retry_strategy().max_attempts(), 3);
    }
}
