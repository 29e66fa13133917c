use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};

/// Secrets that ship in sample env files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub db_timeout: Duration,
    pub retention_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("PARLEY_JWT_SECRET").context("PARLEY_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
            bail!("PARLEY_JWT_SECRET is still a placeholder value");
        }

        let db_timeout_ms: u64 = parse_or(&get, "PARLEY_DB_TIMEOUT_MS", 2000)?;
        let retention_interval_secs: u64 = parse_or(&get, "PARLEY_RETENTION_INTERVAL_SECS", 3600)?;
        if db_timeout_ms == 0 || retention_interval_secs == 0 {
            bail!("PARLEY_DB_TIMEOUT_MS and PARLEY_RETENTION_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            host: get("PARLEY_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "PARLEY_PORT", 3000)?,
            db_path: PathBuf::from(get("PARLEY_DB_PATH").unwrap_or_else(|| "parley.db".into())),
            jwt_secret,
            db_timeout: Duration::from_millis(db_timeout_ms),
            retention_interval_secs,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
