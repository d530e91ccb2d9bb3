//! Configuration for the live feed client

use std::time::Duration;

/// Port the desktop data source listens on by default
pub const DEFAULT_PORT: u16 = 63472;

/// Host the data source is reached on by default
pub const DEFAULT_HOST: &str = "localhost";

/// Delay between an unexpected close and the next connection attempt
pub const DEFAULT_AUTO_RETRY_DURATION: Duration = Duration::from_millis(15_000);

/// Upper bound for a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for connecting to a live feed data source
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Host name of the data source
    pub host: String,

    /// Port of the data source
    pub port: u16,

    /// Shared secret sent in the clear at connection time
    pub password: String,

    /// Fixed delay before reconnecting after an unexpected close
    pub auto_retry_duration: Duration,

    /// Timeout for establishing the socket
    pub connect_timeout: Duration,
}

impl FeedConfig {
    /// Create a new configuration for the given port and password
    pub fn new(port: u16, password: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port,
            password: password.into(),
            auto_retry_duration: DEFAULT_AUTO_RETRY_DURATION,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Build a configuration from `LIVE_FEED_*` environment variables
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let port = env_parse("LIVE_FEED_PORT").unwrap_or(DEFAULT_PORT);
        let password = std::env::var("LIVE_FEED_PASSWORD").unwrap_or_default();

        let mut config = Self::new(port, password);
        if let Ok(host) = std::env::var("LIVE_FEED_HOST") {
            config.host = host;
        }
        if let Some(ms) = env_parse::<u64>("LIVE_FEED_RETRY_MS") {
            config.auto_retry_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("LIVE_FEED_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Set the host name
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the delay between an unexpected close and the retry
    pub fn auto_retry_duration(mut self, duration: Duration) -> Self {
        self.auto_retry_duration = duration;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, "")
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
