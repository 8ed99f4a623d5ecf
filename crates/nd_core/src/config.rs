//! Runtime configuration, read from `NEWSDESK_*` environment variables.
//!
//! [`Config::from_env`] loads a `.env` file first. [`Config::from_lookup`]
//! takes the variable lookup as a closure so tests can feed a map instead of
//! mutating the process environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Knobs for the scrape pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub max_articles_per_source: usize,
    pub request_timeout: Duration,
    /// Pause after each page fetch.
    pub request_delay: Duration,
    /// Budget for one source within a cycle.
    pub source_timeout: Duration,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: 25,
            request_timeout: Duration::from_secs(15),
            request_delay: Duration::from_millis(1000),
            source_timeout: Duration::from_secs(600),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub storage: String,
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub scrape_interval: Duration,
    pub scrape: ScrapeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: "sqlite".to_string(),
            database_path: PathBuf::from("news.db"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            scrape_interval: Duration::from_secs(3600),
            scrape: ScrapeConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let parse_u64 = |var: &str, default: u64| -> Result<u64> {
            match lookup(var) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| Error::Config {
                    var: var.to_string(),
                    reason: e.to_string(),
                }),
                None => Ok(default),
            }
        };

        let storage = lookup("NEWSDESK_STORAGE").unwrap_or(defaults.storage);
        let database_path = lookup("NEWSDESK_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let host = lookup("NEWSDESK_HOST").unwrap_or(defaults.host);

        let port = parse_u64("NEWSDESK_PORT", defaults.port as u64)?;
        let port = u16::try_from(port).map_err(|e| Error::Config {
            var: "NEWSDESK_PORT".to_string(),
            reason: e.to_string(),
        })?;

        let scrape_interval = Duration::from_secs(parse_u64(
            "NEWSDESK_SCRAPE_INTERVAL_SECS",
            defaults.scrape_interval.as_secs(),
        )?);

        let max_articles_per_source = parse_u64(
            "NEWSDESK_MAX_ARTICLES_PER_SOURCE",
            defaults.scrape.max_articles_per_source as u64,
        )? as usize;
        if max_articles_per_source == 0 {
            return Err(Error::Config {
                var: "NEWSDESK_MAX_ARTICLES_PER_SOURCE".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let scrape = ScrapeConfig {
            max_articles_per_source,
            request_timeout: Duration::from_secs(parse_u64(
                "NEWSDESK_REQUEST_TIMEOUT_SECS",
                defaults.scrape.request_timeout.as_secs(),
            )?),
            request_delay: Duration::from_millis(parse_u64(
                "NEWSDESK_REQUEST_DELAY_MS",
                defaults.scrape.request_delay.as_millis() as u64,
            )?),
            source_timeout: Duration::from_secs(parse_u64(
                "NEWSDESK_SOURCE_TIMEOUT_SECS",
                defaults.scrape.source_timeout.as_secs(),
            )?),
            user_agent: lookup("NEWSDESK_USER_AGENT").unwrap_or(defaults.scrape.user_agent),
        };

        Ok(Self {
            storage,
            database_path,
            host,
            port,
            scrape_interval,
            scrape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scrape.max_articles_per_source, 25);
        assert_eq!(config.port, 5000);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("NEWSDESK_DATABASE_PATH", "/tmp/x.db"),
            ("NEWSDESK_PORT", "8080"),
            ("NEWSDESK_MAX_ARTICLES_PER_SOURCE", "5"),
            ("NEWSDESK_REQUEST_DELAY_MS", "0"),
            ("NEWSDESK_STORAGE", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage, "memory");
        assert_eq!(config.scrape.max_articles_per_source, 5);
        assert_eq!(config.scrape.request_delay, Duration::ZERO);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[("NEWSDESK_PORT", "99999")])).unwrap_err();
        assert!(matches!(err, Error::Config { ref var, .. } if var == "NEWSDESK_PORT"));

        let err = Config::from_lookup(lookup_from(&[("NEWSDESK_REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = Config::from_lookup(lookup_from(&[("NEWSDESK_MAX_ARTICLES_PER_SOURCE", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
