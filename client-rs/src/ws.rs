//! WebSocket transport over tokio-tungstenite

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::transport::{CloseInfo, Connector, Frame, Handshake, Transport};

/// Opens WebSocket connections to the data source
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, handshake: &Handshake) -> Result<Box<dyn Transport>> {
        let url = handshake.url()?;

        // The URL carries the password, keep it out of the logs
        debug!(
            host = %handshake.host,
            port = handshake.port,
            types = %handshake.type_list(),
            "Opening WebSocket"
        );

        let (stream, _response) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| FeedError::Timeout)?
            .map_err(|e| FeedError::Connection(e.to_string()))?;

        Ok(Box::new(WsTransport { stream }))
    }
}

/// An open WebSocket to the data source
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Frame> {
        while let Some(message) = self.stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(WsError::ConnectionClosed) => break,
                Err(e) => return Err(FeedError::Transport(e.to_string())),
            };

            match message {
                Message::Text(text) => return Ok(Frame::Text(text)),
                Message::Binary(data) => match String::from_utf8(data) {
                    Ok(text) => return Ok(Frame::Text(text)),
                    Err(e) => warn!("Dropping binary frame: {}", e),
                },
                Message::Close(frame) => return Ok(Frame::Closed(close_info(frame))),
                // Pongs are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }

        Ok(Frame::Closed(CloseInfo::abnormal("stream ended")))
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(FeedError::Transport(e.to_string())),
        }
    }
}

fn close_info(frame: Option<CloseFrame<'_>>) -> CloseInfo {
    match frame {
        Some(frame) => CloseInfo::clean(u16::from(frame.code), frame.reason.into_owned()),
        None => CloseInfo {
            code: None,
            reason: String::new(),
            was_clean: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::messages::EventType;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn test_close_info_from_frame() {
        let info = close_info(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        }));

        assert_eq!(info, CloseInfo::clean(1001, "restarting"));
    }

    #[test]
    fn test_close_info_without_frame() {
        let info = close_info(None);

        assert_eq!(info.code, None);
        assert!(info.was_clean);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then release it so nothing is listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = FeedConfig::new(port, "abc").host("127.0.0.1");
        let handshake = Handshake::new(&config, vec![EventType::Message]);
        let connector = WsConnector::new(Duration::from_secs(5));

        let result = connector.connect(&handshake).await;
        assert!(matches!(result, Err(FeedError::Connection(_))));
    }

    #[tokio::test]
    async fn test_connect_invalid_endpoint() {
        let config = FeedConfig::new(4000, "abc").host("");
        let handshake = Handshake::new(&config, vec![]);
        let connector = WsConnector::new(Duration::from_secs(5));

        let result = connector.connect(&handshake).await;
        assert!(matches!(result, Err(FeedError::InvalidEndpoint(_))));
    }
}
