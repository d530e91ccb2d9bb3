//! Integration tests for live-feed-client
//!
//! Each test runs a local WebSocket server standing in for the data source
//! and drives a real client against it.

use futures_util::{SinkExt, StreamExt};
use live_feed_client::{
    CloseInfo, ConnectionState, FeedClient, FeedConfig, Handlers, MessagePayload,
    MousePositionPayload, PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

const MESSAGE_FRAME: &str = r#"{"type":"message","payload":{"id":"1","timestamp":0,"content":{"string":"hi"},"emotes":[]}}"#;
const WAIT: Duration = Duration::from_secs(5);

/// A connection accepted by the test server
struct Accepted {
    query: HashMap<String, String>,
    path: String,
    socket: WebSocketStream<TcpStream>,
}

struct TestServer {
    port: u16,
    accepted: mpsc::UnboundedReceiver<Accepted>,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut uri = String::new();
                    let capture = |req: &Request, resp: Response| {
                        uri = req.uri().to_string();
                        Ok::<_, ErrorResponse>(resp)
                    };

                    if let Ok(socket) = accept_hdr_async(stream, capture).await {
                        let url = url::Url::parse(&format!("ws://localhost{}", uri)).unwrap();
                        let _ = tx.send(Accepted {
                            query: url.query_pairs().into_owned().collect(),
                            path: url.path().to_string(),
                            socket,
                        });
                    }
                });
            }
        });

        Self { port, accepted }
    }

    async fn accept(&mut self) -> Accepted {
        timeout(WAIT, self.accepted.recv())
            .await
            .expect("client did not connect in time")
            .expect("server stopped")
    }

    fn config(&self) -> FeedConfig {
        FeedConfig::new(self.port, "abc")
            .host("127.0.0.1")
            .auto_retry_duration(Duration::from_millis(200))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Open,
    Close(CloseInfo),
    Error(String),
    Message(MessagePayload),
}

fn recording_handlers() -> (Handlers, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (open, close, error) = (tx.clone(), tx.clone(), tx.clone());

    let handlers = Handlers::new()
        .on(move |m: &MessagePayload| {
            let _ = tx.send(Seen::Message(m.clone()));
        })
        .on_open(move || {
            let _ = open.send(Seen::Open);
        })
        .on_close(move |info| {
            let _ = close.send(Seen::Close(info.clone()));
        })
        .on_error(move |e| {
            let _ = error.send(Seen::Error(e.to_string()));
        });

    (handlers, rx)
}

async fn next(seen: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(WAIT, seen.recv())
        .await
        .expect("no handler ran in time")
        .expect("handlers dropped")
}

#[tokio::test]
async fn test_handshake_and_message_delivery() {
    let mut server = TestServer::spawn().await;
    let (handlers, mut seen) = recording_handlers();
    let client = FeedClient::new(server.config(), handlers);

    client.start();
    let mut conn = server.accept().await;

    assert_eq!(conn.path, "/data");
    assert_eq!(conn.query["authorization"], "abc");
    assert_eq!(conn.query["types"], "message");
    assert_eq!(conn.query["version"], PROTOCOL_VERSION.to_string());
    assert_eq!(next(&mut seen).await, Seen::Open);
    assert_eq!(client.state(), ConnectionState::Open);

    conn.socket
        .send(Message::Text(MESSAGE_FRAME.to_string()))
        .await
        .unwrap();

    match next(&mut seen).await {
        Seen::Message(m) => {
            assert_eq!(m.id, "1");
            assert_eq!(m.content.string, "hi");
        }
        other => panic!("expected message, got {:?}", other),
    }

    client.stop();
    assert!(client.is_stopped());

    // The server sees the socket go away
    let end = timeout(WAIT, conn.socket.next()).await.unwrap();
    assert!(matches!(end, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn test_subscription_set_lists_every_handled_type() {
    let mut server = TestServer::spawn().await;
    let (handlers, _seen) = recording_handlers();
    let handlers = handlers.on(|_: &MousePositionPayload| {});
    let client = FeedClient::new(server.config(), handlers);

    client.start();
    let conn = server.accept().await;

    assert_eq!(conn.query["types"], "message,mousePosition");
    client.stop();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let mut server = TestServer::spawn().await;
    let (handlers, mut seen) = recording_handlers();
    let client = FeedClient::new(server.config(), handlers);

    client.start();
    let mut conn = server.accept().await;
    assert_eq!(next(&mut seen).await, Seen::Open);

    conn.socket
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "restart".into(),
        }))
        .await
        .unwrap();

    assert_eq!(next(&mut seen).await, Seen::Close(CloseInfo::clean(1000, "restart")));

    let mut again = server.accept().await;
    assert_eq!(again.query["types"], "message");
    assert_eq!(next(&mut seen).await, Seen::Open);
    assert!(!client.retry_pending());

    again
        .socket
        .send(Message::Text(MESSAGE_FRAME.to_string()))
        .await
        .unwrap();
    assert!(matches!(next(&mut seen).await, Seen::Message(_)));

    client.stop();
}

#[tokio::test]
async fn test_binary_and_malformed_frames() {
    let mut server = TestServer::spawn().await;
    let (handlers, mut seen) = recording_handlers();
    let client = FeedClient::new(server.config(), handlers);

    client.start();
    let mut conn = server.accept().await;
    assert_eq!(next(&mut seen).await, Seen::Open);

    conn.socket
        .send(Message::Text("{\"type\":".to_string()))
        .await
        .unwrap();
    assert!(matches!(next(&mut seen).await, Seen::Error(e) if e.starts_with("Decode error")));

    conn.socket
        .send(Message::Binary(MESSAGE_FRAME.as_bytes().to_vec()))
        .await
        .unwrap();
    assert!(matches!(next(&mut seen).await, Seen::Message(_)));
    assert_eq!(client.state(), ConnectionState::Open);

    client.stop();
}

#[tokio::test]
async fn test_connection_refused_reports_and_retries() {
    // Reserve a port, then close it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (handlers, mut seen) = recording_handlers();
    let config = FeedConfig::new(port, "abc")
        .host("127.0.0.1")
        .auto_retry_duration(Duration::from_secs(60));
    let client = FeedClient::new(config, handlers);

    client.start();

    assert!(matches!(next(&mut seen).await, Seen::Error(e) if e.starts_with("Connection error")));
    assert!(matches!(next(&mut seen).await, Seen::Close(info) if !info.was_clean));
    assert!(client.is_stopped());
    assert!(client.retry_pending());

    client.stop();
    assert!(!client.retry_pending());
}
