use anyhow::{Context, Result};

use crate::listing::config::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream REST backend, e.g. `https://api.example.com/v1`.
    pub backend_url: String,
    /// Bearer token sent upstream. Optional: some deployments front the
    /// backend with their own auth proxy.
    pub backend_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub request_timeout_secs: u64,
    pub default_page_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            backend_url: require_env("BACKEND_URL")?,
            backend_token: std::env::var("BACKEND_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30)?,
            default_page_size: parse_env("DEFAULT_PAGE_SIZE", DEFAULT_PER_PAGE)?
                .clamp(1, MAX_PER_PAGE),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
