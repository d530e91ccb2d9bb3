//! Live Feed Rust Client
//!
//! A typed, self-healing client for the live-show data feed. One WebSocket
//! connection carries every event type the client subscribed to; inbound
//! envelopes are decoded into typed payloads and handed to the handler
//! registered for their type. Unexpected drops are retried at a fixed
//! interval until the client is stopped.
//!
//! # Example
//!
//! ```no_run
//! use live_feed_client::{FeedClient, FeedConfig, GiftPayload, Handlers, MessagePayload};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = FeedConfig::new(63472, "your-password")
//!         .auto_retry_duration(Duration::from_secs(5));
//!
//!     let handlers = Handlers::new()
//!         .on(|m: &MessagePayload| println!("chat: {}", m.content.string))
//!         .on(|g: &GiftPayload| println!("gift x{}", g.count))
//!         .on_open(|| println!("connected"))
//!         .on_close(|info| println!("closed: {:?}", info.code));
//!
//!     // Subscribes to `message` and `gift`
//!     let client = FeedClient::new(config, handlers);
//!     client.start();
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.stop();
//! }
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod messages;
mod supervisor;
mod transport;
mod ws;

pub use client::{ConnectionState, FeedClient};
pub use config::{FeedConfig, DEFAULT_AUTO_RETRY_DURATION, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT};
pub use dispatch::{
    CloseHandler, Dispatch, ErrorHandler, EventHandler, Handlers, OpenHandler, Router,
};
pub use error::{FeedError, Result};
pub use messages::{
    Audience, Badge, CaptionPayload, Emote, EnterPayload, Envelope, Event, EventType,
    FollowPayload, GamepadPayload, GiftPayload, HeartRatePayload, ImageContent,
    InputAudioSpectrumPayload, KaraokeStationItem, KaraokeStationPayload, KeyboardButtonPayload,
    MediaInfoPayload, MediaPlaybackRepeatMode, MediaPlaybackStatus, MediaType,
    MembershipPayload, MessagePayload, MouseButtonPayload, MousePositionPayload,
    OutputAudioSpectrumPayload, Payload, Sku, StringContent, SuperChatPayload,
    UnknownEventType, ViewersCountPayload,
};
pub use transport::{CloseInfo, Connector, Frame, Handshake, Transport, PROTOCOL_VERSION};
pub use ws::{WsConnector, WsTransport};
