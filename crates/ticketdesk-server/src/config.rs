use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use chrono::Duration;

use ticketdesk_api::AuthSettings;
use ticketdesk_db::Backend;

/// Secrets that ship in docs and sample `.env` files.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Json,
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store {:?} (expected json, sqlite or memory)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub session_ttl_minutes: i64,
    pub secure_cookies: bool,
    pub seed_demo_user: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            host: var("TICKETDESK_HOST", "0.0.0.0"),
            port: parse(&var("TICKETDESK_PORT", "3000"), "TICKETDESK_PORT")?,
            store: var("TICKETDESK_STORE", "json").parse()?,
            data_dir: var("TICKETDESK_DATA_DIR", "./data").into(),
            jwt_secret: var("TICKETDESK_JWT_SECRET", PLACEHOLDER_SECRETS[0]),
            token_ttl_hours: parse(&var("TICKETDESK_TOKEN_TTL_HOURS", "24"), "TICKETDESK_TOKEN_TTL_HOURS")?,
            session_ttl_minutes: parse(
                &var("TICKETDESK_SESSION_TTL_MINUTES", "120"),
                "TICKETDESK_SESSION_TTL_MINUTES",
            )?,
            secure_cookies: flag(&var("TICKETDESK_SECURE_COOKIES", "false"), "TICKETDESK_SECURE_COOKIES")?,
            seed_demo_user: flag(&var("TICKETDESK_SEED_DEMO_USER", "true"), "TICKETDESK_SEED_DEMO_USER")?,
        };

        if config.token_ttl_hours <= 0 || config.session_ttl_minutes <= 0 {
            bail!("token and session lifetimes must be positive");
        }
        Ok(config)
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }

    pub fn backend(&self) -> Backend {
        match self.store {
            StoreKind::Json => Backend::Json(self.data_dir.clone()),
            StoreKind::Sqlite => Backend::Sqlite(self.data_dir.join("ticketdesk.db")),
            StoreKind::Memory => Backend::Memory,
        }
    }

    pub fn auth(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl: Duration::hours(self.token_ttl_hours),
            session_ttl: Duration::minutes(self.session_ttl_minutes),
            secure_cookies: self.secure_cookies,
        }
    }
}

fn parse<T: FromStr>(raw: &str, key: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}"))
}

fn flag(raw: &str, key: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid {key}: {raw:?} (expected true or false)"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.port, 3000);
        assert_eq!(c.store, StoreKind::Json);
        assert_eq!(c.data_dir, PathBuf::from("./data"));
        assert!(c.uses_placeholder_secret());
        assert!(!c.secure_cookies);
        assert!(c.seed_demo_user);
        assert_eq!(c.auth().session_ttl, Duration::minutes(120));
        assert!(matches!(c.backend(), Backend::Json(dir) if dir == PathBuf::from("./data")));
    }

    #[test]
    fn overrides() {
        let c = config(&[
            ("TICKETDESK_PORT", "8080"),
            ("TICKETDESK_STORE", "SQLite"),
            ("TICKETDESK_DATA_DIR", "/var/lib/ticketdesk"),
            ("TICKETDESK_JWT_SECRET", "a-real-secret"),
            ("TICKETDESK_TOKEN_TTL_HOURS", "2"),
            ("TICKETDESK_SECURE_COOKIES", "yes"),
            ("TICKETDESK_SEED_DEMO_USER", "0"),
        ])
        .unwrap();
        assert_eq!(c.port, 8080);
        assert!(!c.uses_placeholder_secret());
        assert!(c.secure_cookies);
        assert!(!c.seed_demo_user);
        assert_eq!(c.auth().token_ttl, Duration::hours(2));
        assert!(
            matches!(c.backend(), Backend::Sqlite(path) if path == PathBuf::from("/var/lib/ticketdesk/ticketdesk.db"))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("TICKETDESK_PORT", "http")]).is_err());
        assert!(config(&[("TICKETDESK_STORE", "postgres")]).is_err());
        assert!(config(&[("TICKETDESK_SECURE_COOKIES", "maybe")]).is_err());
        assert!(config(&[("TICKETDESK_SESSION_TTL_MINUTES", "0")]).is_err());
    }
}
