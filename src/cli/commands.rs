//! CLI argument definitions

use clap::Parser;
use live_feed_client::{EventType, FeedConfig, DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "live-feed")]
#[command(about = "Subscribe to the live-show data feed and print events as JSON lines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Host running the data source
    #[arg(long, env = "LIVE_FEED_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Data source port
    #[arg(short, long, env = "LIVE_FEED_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Data source password
    #[arg(long, env = "LIVE_FEED_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Event types to subscribe to, comma separated (default: all)
    ///
    /// Examples:
    ///   live-feed --types message,gift,superChat
    #[arg(
        short,
        long,
        env = "LIVE_FEED_TYPES",
        value_delimiter = ',',
        value_parser = parse_event_type
    )]
    pub types: Vec<EventType>,

    /// Delay before reconnecting after an unexpected close, in milliseconds
    #[arg(long, env = "LIVE_FEED_RETRY_MS", default_value_t = 15_000)]
    pub retry_ms: u64,

    /// Connection attempt timeout, in milliseconds
    #[arg(long, env = "LIVE_FEED_CONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,
}

impl Cli {
    pub fn config(&self) -> FeedConfig {
        FeedConfig::new(self.port, self.password.clone())
            .host(self.host.clone())
            .auto_retry_duration(Duration::from_millis(self.retry_ms))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }

    /// Requested types, or every type when none were given
    pub fn event_types(&self) -> Vec<EventType> {
        if self.types.is_empty() {
            EventType::ALL.to_vec()
        } else {
            let mut types = self.types.clone();
            types.sort();
            types.dedup();
            types
        }
    }
}

fn parse_event_type(s: &str) -> Result<EventType, String> {
    s.trim().parse::<EventType>().map_err(|_| {
        let known: Vec<&str> = EventType::ALL.iter().map(|t| t.as_str()).collect();
        format!("Invalid event type: {}. Must be one of {}", s, known.join(", "))
    })
}
