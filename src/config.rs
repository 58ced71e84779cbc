use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::nbp::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => anyhow::bail!("Unknown environment {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub nbp_api_url: String,
    pub request_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub export_dir: PathBuf,
    pub cleanup_interval: Duration,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            nbp_api_url: get("NBP_API_URL", DEFAULT_BASE_URL),
            request_timeout: Duration::from_secs(parse_nonzero(&lookup, "NBP_TIMEOUT_SECS", 10)?),
            host: get("HOST", "0.0.0.0"),
            port: parse(&lookup, "PORT", 5000)?,
            cors_origin: get("CORS_ORIGIN", "http://localhost:5173"),
            rate_limit_window: Duration::from_millis(parse_nonzero(
                &lookup,
                "RATE_LIMIT_WINDOW_MS",
                900_000,
            )?),
            rate_limit_max_requests: parse(&lookup, "RATE_LIMIT_MAX_REQUESTS", 100)?,
            export_dir: PathBuf::from(get("EXPORT_DIR", "uploads")),
            cleanup_interval: Duration::from_secs(parse_nonzero(
                &lookup,
                "CLEANUP_INTERVAL_SECS",
                3600,
            )?),
            environment: get("APP_ENV", "development").parse()?,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// Durations feed `tokio::time::interval` and request timeouts, neither of
/// which accepts zero.
fn parse_nonzero(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    let value = parse(lookup, key, default)?;
    if value == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.nbp_api_url, "https://api.nbp.pl/api");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origin, "http://localhost:5173");
        assert_eq!(config.rate_limit_window, Duration::from_secs(15 * 60));
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(config.export_dir, PathBuf::from("uploads"));
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("APP_ENV", "production"),
            ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ("EXPORT_DIR", "/tmp/exports"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.environment.is_production());
        assert_eq!(config.rate_limit_max_requests, 5);
        assert_eq!(config.export_dir, PathBuf::from("/tmp/exports"));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn rejects_zero_durations() {
        for key in [
            "NBP_TIMEOUT_SECS",
            "RATE_LIMIT_WINDOW_MS",
            "CLEANUP_INTERVAL_SECS",
        ] {
            let err = config_from(&[(key, "0")]).unwrap_err();
            assert_eq!(err.to_string(), format!("{key} must be greater than zero"));
        }
    }

    #[test]
    fn rejects_unknown_environment() {
        assert!(config_from(&[("APP_ENV", "staging")]).is_err());
    }
}
