use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    /// Deadline for a single model invocation. Overruns surface as `CapabilityUnavailable`.
    pub invocation_timeout: Duration,
    /// How many times a single-invocation flow retries a `CapabilityUnavailable` failure.
    pub flow_max_retries: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            gemini_api_base: std::env::var("GEMINI_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            invocation_timeout: Duration::from_secs(
                parse_env_or("INVOCATION_TIMEOUT_SECS", 120)
                    .context("INVOCATION_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            flow_max_retries: parse_env_or("FLOW_MAX_RETRIES", 2)
                .context("FLOW_MAX_RETRIES must be a non-negative integer")?,
            port: parse_env_or("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_or_falls_back_to_default() {
        let value: u32 = parse_env_or("INKWELL_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parse_env_or_rejects_garbage() {
        std::env::set_var("INKWELL_TEST_BAD_PORT", "eighty");
        let result: Result<u16> = parse_env_or("INKWELL_TEST_BAD_PORT", 8080);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_env_or_reads_value() {
        std::env::set_var("INKWELL_TEST_RETRIES", " 4 ");
        let value: u32 = parse_env_or("INKWELL_TEST_RETRIES", 2).unwrap();
        assert_eq!(value, 4);
    }
}
