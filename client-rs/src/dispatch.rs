//! Handler table and inbound frame routing

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::messages::{Envelope, Event, EventType, Payload};
use crate::transport::CloseInfo;

/// Handler for decoded events
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handler run when a connection opens
pub type OpenHandler = Arc<dyn Fn() + Send + Sync>;

/// Handler run when a connection closes unexpectedly
pub type CloseHandler = Arc<dyn Fn(&CloseInfo) + Send + Sync>;

/// Handler for transport and decode errors
pub type ErrorHandler = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// Handlers a client is constructed with
///
/// The event types with a handler form the subscription set. The lifecycle
/// handlers (`open`, `close`, `error`) are never part of it.
///
/// ```
/// use live_feed_client::{Handlers, MessagePayload};
///
/// let handlers = Handlers::new()
///     .on(|m: &MessagePayload| println!("{}", m.content.string))
///     .on_open(|| println!("connected"));
///
/// assert_eq!(handlers.event_types().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Handlers {
    events: HashMap<EventType, EventHandler>,
    open: Option<OpenHandler>,
    close: Option<CloseHandler>,
    error: Option<ErrorHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle events of the type carrying payload `P`
    pub fn on<P, F>(mut self, handler: F) -> Self
    where
        P: Payload,
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.events.insert(P::EVENT_TYPE, typed(handler));
        self
    }

    /// Handle events of `event_type` as a whole [`Event`]
    pub fn on_event<F>(mut self, event_type: EventType, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.insert(event_type, Arc::new(handler));
        self
    }

    pub fn on_open<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.open = Some(Arc::new(handler));
        self
    }

    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(&CloseInfo) + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(handler));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FeedError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(handler));
        self
    }

    /// Event types with a handler, in declaration order
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.events.keys().copied().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("events", &self.event_types())
            .field("open", &self.open.is_some())
            .field("close", &self.close.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

pub(crate) fn typed<P, F>(handler: F) -> EventHandler
where
    P: Payload,
    F: Fn(&P) + Send + Sync + 'static,
{
    Arc::new(move |event: &Event| {
        if let Some(payload) = P::from_event(event) {
            handler(payload);
        }
    })
}

/// Outcome of routing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The registered handler ran
    Delivered(EventType),
    /// Known type without a handler
    Unhandled(EventType),
    /// Type outside the protocol
    Unknown(String),
}

/// Decodes inbound frames and runs the matching handler
///
/// Handlers are cloned out of the table before they run, so a handler may
/// register other handlers without deadlocking.
pub struct Router {
    handlers: RwLock<Handlers>,
}

impl Router {
    pub fn new(handlers: Handlers) -> Self {
        Self {
            handlers: RwLock::new(handlers),
        }
    }

    /// Route one text frame
    ///
    /// A malformed frame or a payload that does not match its type is an
    /// error; the caller decides how to report it.
    pub fn route(&self, text: &str) -> Result<Dispatch> {
        let envelope = Envelope::parse(text)?;
        let name = envelope.event_type.clone();

        let Some(event) = envelope.into_event()? else {
            debug!(event_type = %name, "Dropping unknown event type");
            return Ok(Dispatch::Unknown(name));
        };

        let event_type = event.event_type();
        let handler = self.handlers.read().events.get(&event_type).cloned();

        match handler {
            Some(handler) => {
                handler(&event);
                Ok(Dispatch::Delivered(event_type))
            }
            None => {
                debug!(%event_type, "No handler registered");
                Ok(Dispatch::Unhandled(event_type))
            }
        }
    }

    /// Register or replace the handler for one event type
    pub fn set(&self, event_type: EventType, handler: EventHandler) {
        self.handlers.write().events.insert(event_type, handler);
    }

    pub fn has_handler(&self, event_type: EventType) -> bool {
        self.handlers.read().events.contains_key(&event_type)
    }

    pub(crate) fn open_handler(&self) -> Option<OpenHandler> {
        self.handlers.read().open.clone()
    }

    pub(crate) fn close_handler(&self) -> Option<CloseHandler> {
        self.handlers.read().close.clone()
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.handlers.read().error.clone()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("handlers", &*self.handlers.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{HeartRatePayload, MessagePayload, MousePositionPayload};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MESSAGE_FRAME: &str = r#"{"type":"message","payload":{"id":"1","timestamp":0,"content":{"string":"hi"},"emotes":[]}}"#;

    fn recording_router() -> (Router, Arc<Mutex<Vec<MessagePayload>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let router = Router::new(Handlers::new().on(move |m: &MessagePayload| {
            sink.lock().push(m.clone());
        }));
        (router, seen)
    }

    #[test]
    fn test_route_delivers_once() {
        let (router, seen) = recording_router();

        let outcome = router.route(MESSAGE_FRAME).unwrap();

        assert_eq!(outcome, Dispatch::Delivered(EventType::Message));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, "1");
        assert_eq!(seen[0].content.string, "hi");
        assert!(seen[0].emotes.is_empty());
    }

    #[test]
    fn test_route_unhandled_type() {
        let (router, seen) = recording_router();

        let outcome = router
            .route(r#"{"type":"heartRate","payload":{"timestamp":1,"count":70}}"#)
            .unwrap();

        assert_eq!(outcome, Dispatch::Unhandled(EventType::HeartRate));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_route_unknown_type() {
        let (router, seen) = recording_router();

        let outcome = router.route(r#"{"type":"confetti","payload":{}}"#).unwrap();

        assert_eq!(outcome, Dispatch::Unknown("confetti".to_string()));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_route_decode_errors() {
        let (router, seen) = recording_router();

        assert!(matches!(router.route("{"), Err(FeedError::Decode(_))));
        assert!(matches!(
            router.route(r#"{"type":"message","payload":{"id":1}}"#),
            Err(FeedError::Decode(_))
        ));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_set_replaces_handler() {
        let (router, seen) = recording_router();
        let replaced = Arc::new(AtomicUsize::new(0));

        let counter = replaced.clone();
        router.set(
            EventType::Message,
            typed(move |_: &MessagePayload| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        router.route(MESSAGE_FRAME).unwrap();

        assert_eq!(replaced.load(Ordering::SeqCst), 1);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_handler_can_register_handlers() {
        let router = Arc::new(Router::new(Handlers::new()));
        let positions = Arc::new(AtomicUsize::new(0));

        let inner = router.clone();
        let counter = positions.clone();
        router.set(
            EventType::HeartRate,
            typed(move |_: &HeartRatePayload| {
                let counter = counter.clone();
                inner.set(
                    EventType::MousePosition,
                    typed(move |_: &MousePositionPayload| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        router
            .route(r#"{"type":"heartRate","payload":{"timestamp":1,"count":70}}"#)
            .unwrap();
        router
            .route(r#"{"type":"mousePosition","payload":{"x":1,"y":1}}"#)
            .unwrap();

        assert!(router.has_handler(EventType::MousePosition));
        assert_eq!(positions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_event_types_exclude_lifecycle() {
        let handlers = Handlers::new()
            .on_open(|| {})
            .on_close(|_| {})
            .on_error(|_| {})
            .on(|_: &MousePositionPayload| {})
            .on_event(EventType::Enter, |_| {})
            .on(|_: &MessagePayload| {});

        assert_eq!(
            handlers.event_types(),
            vec![EventType::Enter, EventType::Message, EventType::MousePosition]
        );
    }

    #[test]
    fn test_on_event_receives_whole_event() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let router = Router::new(Handlers::new().on_event(EventType::Message, move |event| {
            *sink.lock() = Some(event.event_type());
        }));

        router.route(MESSAGE_FRAME).unwrap();
        assert_eq!(*seen.lock(), Some(EventType::Message));
    }
}
