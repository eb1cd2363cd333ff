use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub checkpoint_interval_secs: u64,
    pub outbox_interval_secs: u64,
    pub webhook_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("TRACEMARK_JWT_SECRET").unwrap_or_default();
        check_secret(&jwt_secret)?;

        Ok(Self {
            host: std::env::var("TRACEMARK_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("TRACEMARK_PORT")
                .unwrap_or_else(|_| "3400".into())
                .parse()
                .context("TRACEMARK_PORT must be a port number")?,
            db_path: std::env::var("TRACEMARK_DB_PATH")
                .unwrap_or_else(|_| "tracemark.db".into())
                .into(),
            jwt_secret,
            checkpoint_interval_secs: interval("TRACEMARK_CHECKPOINT_INTERVAL_SECS", 3600),
            outbox_interval_secs: interval("TRACEMARK_OUTBOX_INTERVAL_SECS", 5),
            webhook_url: std::env::var("TRACEMARK_NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

fn check_secret(secret: &str) -> Result<()> {
    if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
        bail!("TRACEMARK_JWT_SECRET is unset or still a placeholder; it must match the auth service's secret");
    }
    Ok(())
}

/// Zero would make `tokio::time::interval` panic.
fn interval(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(check_secret("").is_err());
        assert!(check_secret("dev-secret-change-me").is_err());
        assert!(check_secret("a-real-secret").is_ok());
    }
}
