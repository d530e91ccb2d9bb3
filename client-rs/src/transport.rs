//! Transport seam between the client and the socket implementation
//!
//! A [`Connector`] opens one connection per attempt and hands back a
//! [`Transport`] the client reads frames from until it closes. The WebSocket
//! implementation lives in [`crate::ws`]; tests plug in scripted doubles.

use async_trait::async_trait;
use url::Url;

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::messages::EventType;

/// Protocol version sent with every handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Close code used when the socket went away without a close frame
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Parameters the data source receives when a connection is opened
///
/// They cannot be renegotiated while the connection is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Subscription set, in request order
    pub types: Vec<EventType>,
    pub version: u32,
}

impl Handshake {
    /// Handshake for the given configuration and subscription set
    pub fn new(config: &FeedConfig, types: Vec<EventType>) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            password: config.password.clone(),
            types,
            version: PROTOCOL_VERSION,
        }
    }

    /// Comma-joined subscription set as sent on the wire
    pub fn type_list(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// WebSocket URL carrying the handshake as query parameters
    pub fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("ws://{}:{}/data", self.host, self.port))
            .map_err(|e| FeedError::InvalidEndpoint(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("authorization", &self.password)
            .append_pair("types", &self.type_list())
            .append_pair("version", &self.version.to_string());

        Ok(url)
    }
}

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code from the close frame, if one was received
    pub code: Option<u16>,
    pub reason: String,
    /// Whether the closing handshake completed
    pub was_clean: bool,
}

impl CloseInfo {
    /// Close initiated by the peer with a close frame
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
            was_clean: true,
        }
    }

    /// The socket dropped or failed without a closing handshake
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Some(ABNORMAL_CLOSE_CODE),
            reason: reason.into(),
            was_clean: false,
        }
    }
}

/// One inbound occurrence on an open connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame, expected to hold one envelope
    Text(String),
    /// The connection closed; no further frames follow
    Closed(CloseInfo),
}

/// An open, receive-only connection
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next frame
    ///
    /// An error means the socket failed; the caller treats it as closed.
    async fn recv(&mut self) -> Result<Frame>;

    /// Close the socket. No frames are delivered afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// Opens connections for a client
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>>;
}
