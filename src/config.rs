//! Streaming session configuration.

use std::time::Duration;

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9880/ragflow/api/v1";

/// Default overall deadline for one completion.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Inactivity timeout before any data has arrived.
pub const DEFAULT_INITIAL_INACTIVITY: Duration = Duration::from_millis(30_000);

/// Inactivity timeout once data is flowing.
pub const DEFAULT_STREAMING_INACTIVITY: Duration = Duration::from_millis(8_000);

pub const ENV_BASE_URL: &str = "RAGSTREAM_BASE_URL";
pub const ENV_TOKEN: &str = "RAGSTREAM_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "RAGSTREAM_TIMEOUT_MS";
pub const ENV_GRACE_MS: &str = "RAGSTREAM_GRACE_MS";

/// Configuration for streaming sessions.
///
/// Use the builder pattern to customize behavior.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ragstream::StreamConfig;
///
/// let config = StreamConfig::default()
///     .with_overall_timeout(Duration::from_secs(120))
///     .with_grace_window(Duration::from_secs(3));
/// assert_eq!(config.grace_window, Some(Duration::from_secs(3)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Service base URL; completions go to `{base_url}/deepseek`
    pub base_url: String,
    /// Bearer token sent as `Authorization`, if any
    pub token: Option<String>,
    /// Fixed deadline from session start (default: 60s)
    pub overall_timeout: Duration,
    /// Inactivity timeout before the first meaningful fragment (default: 30s)
    pub initial_inactivity_timeout: Duration,
    /// Inactivity timeout after the first meaningful fragment (default: 8s)
    pub streaming_inactivity_timeout: Duration,
    /// Complete the session when no new content arrives for this long (default: off)
    pub grace_window: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            initial_inactivity_timeout: DEFAULT_INITIAL_INACTIVITY,
            streaming_inactivity_timeout: DEFAULT_STREAMING_INACTIVITY,
            grace_window: None,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the overall deadline.
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    /// Set both inactivity timeouts.
    pub fn with_inactivity_timeouts(mut self, initial: Duration, streaming: Duration) -> Self {
        self.initial_inactivity_timeout = initial;
        self.streaming_inactivity_timeout = streaming;
        self
    }

    /// Enable the post-content grace window.
    pub fn with_grace_window(mut self, window: Duration) -> Self {
        self.grace_window = Some(window);
        self
    }

    /// Create config from `RAGSTREAM_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed numbers are ignored
    /// with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            config.token = Some(token.trim().to_string());
        }
        if let Some(ms) = parse_millis(&lookup, ENV_TIMEOUT_MS) {
            config.overall_timeout = ms;
        }
        if let Some(ms) = parse_millis(&lookup, ENV_GRACE_MS) {
            config.grace_window = Some(ms);
        }

        config
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(key, value = %raw, "Ignoring malformed duration: {}", e);
            None
        }
    }
}
