use std::time::Duration;

use crate::http::Session;

pub const DEFAULT_API_URL: &str = "http://localhost:3333";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub session: Session,
    pub timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Read `COURTSIDE_*` environment variables. Unset or unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("COURTSIDE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let session = Session {
            token: non_empty("COURTSIDE_TOKEN"),
            refresh_token: non_empty("COURTSIDE_REFRESH_TOKEN"),
        };
        let timeout_secs: u64 = non_empty("COURTSIDE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let metrics_port: Option<u16> = non_empty("COURTSIDE_METRICS_PORT").and_then(|s| s.parse().ok());

        Self {
            api_url,
            session,
            timeout: Duration::from_secs(timeout_secs),
            metrics_port,
        }
    }
}
