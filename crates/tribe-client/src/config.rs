//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the client runs against the public demo
//! server with no configuration at all.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use tribe_shared::constants::{DEFAULT_API_BASE, DEFAULT_HTTP_TIMEOUT_SECS};

use crate::poller::PollSettings;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat REST service.
    /// Env: `TRIBE_API_URL`
    /// Default: the public demo server.
    pub api_base_url: String,

    /// SQLite file holding the persisted chat state.
    /// Env: `TRIBE_STATE_DB`
    /// Default: `None`, meaning the platform data directory.
    pub state_db_path: Option<PathBuf>,

    /// Per-request timeout.
    /// Env: `TRIBE_HTTP_TIMEOUT_SECS`
    /// Default: 15 seconds.
    pub http_timeout: Duration,

    /// Poller intervals and retry limit.
    /// Env: `TRIBE_POLL_INTERVAL_MS`, `TRIBE_POLL_SLOW_INTERVAL_MS`,
    /// `TRIBE_POLL_MAX_BACKOFF_MS`, `TRIBE_POLL_MAX_RETRIES`
    pub poll: PollSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            state_db_path: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            poll: PollSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or invalid values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("TRIBE_API_URL") {
            if Url::parse(&url).is_ok_and(|u| !u.cannot_be_a_base()) {
                config.api_base_url = url;
            } else {
                tracing::warn!(value = %url, "Invalid TRIBE_API_URL, using default");
            }
        }

        if let Some(path) = lookup("TRIBE_STATE_DB") {
            if !path.is_empty() {
                config.state_db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(secs) = parse_positive::<u64>(&lookup, "TRIBE_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(ms) = parse_positive::<u64>(&lookup, "TRIBE_POLL_INTERVAL_MS") {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_positive::<u64>(&lookup, "TRIBE_POLL_SLOW_INTERVAL_MS") {
            config.poll.slow_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_positive::<u64>(&lookup, "TRIBE_POLL_MAX_BACKOFF_MS") {
            config.poll.max_backoff = Duration::from_millis(ms);
        }
        if let Some(n) = parse_positive::<u32>(&lookup, "TRIBE_POLL_MAX_RETRIES") {
            config.poll.max_retries = n;
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

fn parse_positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
