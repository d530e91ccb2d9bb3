//! Live feed client implementation

use crate::config::FeedConfig;
use crate::dispatch::{typed, EventHandler, Handlers, Router};
use crate::error::FeedError;
use crate::messages::{Event, EventType, Payload};
use crate::supervisor::Supervisor;
use crate::transport::{CloseInfo, Connector, Frame, Handshake};
use crate::ws::WsConnector;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Connection state of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection
    Stopped,
    /// A connection attempt is in flight
    Connecting,
    /// Connected and receiving frames
    Open,
    /// The connection dropped and its close handler is running
    Closing,
}

/// The single live connection of a client
struct LiveConnection {
    generation: u64,
    // Dropping the sender also stops the connection task
    shutdown: oneshot::Sender<()>,
}

/// Internal client state
struct ClientInner {
    config: FeedConfig,
    connector: Arc<dyn Connector>,

    // Fixed at construction
    subscription: Vec<EventType>,
    router: Router,

    state: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,

    connection: Mutex<Option<LiveConnection>>,
    generation: AtomicU64,

    supervisor: Supervisor,
}

/// Live feed client
///
/// Subscribes to the event types it was given handlers for and keeps
/// reconnecting after unexpected drops until [`FeedClient::stop`] is called.
/// This struct is cheaply cloneable as it uses an internal Arc. Dropping the
/// last clone closes the connection and cancels any pending retry.
///
/// # Example
///
/// ```no_run
/// use live_feed_client::{FeedClient, FeedConfig, Handlers, MessagePayload};
///
/// # async fn run() {
/// let handlers = Handlers::new()
///     .on(|m: &MessagePayload| println!("{}", m.content.string))
///     .on_error(|e| eprintln!("feed error: {e}"));
///
/// let client = FeedClient::new(FeedConfig::new(63472, "secret"), handlers);
/// client.start();
/// # }
/// ```
#[derive(Clone)]
pub struct FeedClient {
    inner: Arc<ClientInner>,
}

impl FeedClient {
    /// Create a client that connects over WebSocket
    pub fn new(config: FeedConfig, handlers: Handlers) -> Self {
        let connector = WsConnector::new(config.connect_timeout);
        Self::with_connector(config, handlers, connector)
    }

    /// Create a client that opens connections through `connector`
    pub fn with_connector<C: Connector>(config: FeedConfig, handlers: Handlers, connector: C) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Stopped);

        let inner = Arc::new(ClientInner {
            subscription: handlers.event_types(),
            router: Router::new(handlers),
            supervisor: Supervisor::new(config.auto_retry_duration),
            config,
            connector: Arc::new(connector),
            state: state_tx,
            state_rx,
            connection: Mutex::new(None),
            generation: AtomicU64::new(0),
        });

        Self { inner }
    }

    /// Open a connection unless one is already live
    ///
    /// Returns immediately; the `open` handler reports when the connection
    /// is up. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.inner.start();
    }

    /// Close the live connection and cancel any pending retry
    ///
    /// The `close` handler does not run for an intentional stop.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// True when there is no live connection
    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Get a receiver for connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Event types requested at every connection
    pub fn subscription(&self) -> &[EventType] {
        &self.inner.subscription
    }

    /// Whether a reconnection is scheduled
    pub fn retry_pending(&self) -> bool {
        self.inner.supervisor.is_pending()
    }

    /// Configuration the client was created with
    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }

    /// Register or replace the handler for the event type carrying `P`
    ///
    /// The subscription set is not widened: a type that was not subscribed at
    /// construction is only delivered if the data source sends it anyway.
    pub fn on<P, F>(&self, handler: F)
    where
        P: Payload,
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.inner.register(P::EVENT_TYPE, typed(handler));
    }

    /// Register or replace the handler for `event_type`
    pub fn on_event<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.register(event_type, Arc::new(handler));
    }
}

impl fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedClient")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("subscription", &self.inner.subscription)
            .field("state", &self.state())
            .finish()
    }
}

impl ClientInner {
    fn set_state(&self, state: ConnectionState) {
        let _ = self.state.send(state);
    }

    fn is_stopped(&self) -> bool {
        matches!(
            *self.state_rx.borrow(),
            ConnectionState::Stopped | ConnectionState::Closing
        )
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(self.connection.lock().as_ref(), Some(live) if live.generation == generation)
    }

    fn register(&self, event_type: EventType, handler: EventHandler) {
        if self.router.has_handler(event_type) {
            debug!(%event_type, "Replacing handler");
        }
        if !self.subscription.contains(&event_type) {
            debug!(%event_type, "Handler registered for a type outside the subscription set");
        }
        self.router.set(event_type, handler);
    }

    fn start(self: &Arc<Self>) {
        let mut connection = self.connection.lock();
        if connection.is_some() {
            debug!("start() ignored, connection already live");
            return;
        }
        self.connect_locked(&mut connection);
    }

    /// Open a new connection into the empty slot
    fn connect_locked(self: &Arc<Self>, connection: &mut Option<LiveConnection>) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *connection = Some(LiveConnection {
            generation,
            shutdown: shutdown_tx,
        });
        self.set_state(ConnectionState::Connecting);

        let handshake = Handshake::new(&self.config, self.subscription.clone());
        info!(generation, types = %handshake.type_list(), "Connecting to live feed");

        tokio::spawn(connection_task(
            Arc::downgrade(self),
            self.connector.clone(),
            handshake,
            generation,
            shutdown_rx,
        ));
    }

    fn stop(&self) {
        // Cancel under the slot lock, the same lock a close arms its retry under
        let mut connection = self.connection.lock();
        let cancelled = self.supervisor.cancel();

        match connection.take() {
            Some(live) => {
                let _ = live.shutdown.send(());
                self.set_state(ConnectionState::Stopped);
                info!(generation = live.generation, "Live feed stopped");
            }
            None => debug!(cancelled_retry = cancelled, "stop() with no live connection"),
        }
    }

    fn handle_opened(&self, generation: u64) -> bool {
        {
            let connection = self.connection.lock();
            if !matches!(connection.as_ref(), Some(live) if live.generation == generation) {
                return false;
            }
            self.set_state(ConnectionState::Open);
        }

        self.supervisor.cancel();
        info!(generation, "Live feed connected");

        if let Some(handler) = self.router.open_handler() {
            handler();
        }
        true
    }

    fn handle_frame(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }

        match self.router.route(text) {
            Ok(_) => {}
            Err(e) => {
                warn!(generation, "Dropping malformed frame: {}", e);
                self.report_error(&e);
            }
        }
    }

    fn handle_error(&self, generation: u64, error: &FeedError) {
        if self.is_current(generation) {
            warn!(generation, "Live feed error: {}", error);
            self.report_error(error);
        }
    }

    fn handle_closed(self: &Arc<Self>, generation: u64, info: CloseInfo) {
        {
            let mut connection = self.connection.lock();
            if !matches!(connection.as_ref(), Some(live) if live.generation == generation) {
                return;
            }
            *connection = None;
            self.set_state(ConnectionState::Closing);
            self.schedule_retry();
        }

        info!(
            generation,
            code = ?info.code,
            reason = %info.reason,
            delay = ?self.supervisor.delay(),
            "Live feed closed, retry scheduled"
        );

        if let Some(handler) = self.router.close_handler() {
            handler(&info);
        }

        // The close handler may already have restarted the client
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Closing {
                *state = ConnectionState::Stopped;
                true
            } else {
                false
            }
        });
    }

    fn report_error(&self, error: &FeedError) {
        if let Some(handler) = self.router.error_handler() {
            handler(error);
        }
    }

    fn schedule_retry(self: &Arc<Self>) {
        let client = Arc::downgrade(self);
        self.supervisor.arm(move |timer| {
            let Some(inner) = client.upgrade() else {
                return;
            };

            // Claim the timer and reconnect under one hold of the slot lock
            let mut connection = inner.connection.lock();
            if !inner.supervisor.take_fired(timer) {
                return;
            }

            if connection.is_none() {
                info!("Retrying live feed connection");
                inner.connect_locked(&mut connection);
            } else {
                debug!("Retry skipped, client already restarted");
            }
        });
    }
}

/// Drives one connection: connect, then read and dispatch frames until it closes
async fn connection_task(
    client: Weak<ClientInner>,
    connector: Arc<dyn Connector>,
    handshake: Handshake,
    generation: u64,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        biased;
        _ = &mut shutdown => {
            debug!(generation, "Connection attempt abandoned");
            return;
        }
        result = connector.connect(&handshake) => result,
    };

    let mut transport = match connected {
        Ok(transport) => transport,
        Err(e) => {
            if let Some(inner) = client.upgrade() {
                inner.handle_error(generation, &e);
                inner.handle_closed(generation, CloseInfo::abnormal(e.to_string()));
            }
            return;
        }
    };

    let opened = client
        .upgrade()
        .is_some_and(|inner| inner.handle_opened(generation));
    if !opened {
        let _ = transport.close().await;
        return;
    }

    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut shutdown => {
                if let Err(e) = transport.close().await {
                    debug!(generation, "Error closing transport: {}", e);
                }
                debug!(generation, "Connection closed by client");
                return;
            }
            frame = transport.recv() => frame,
        };

        let Some(inner) = client.upgrade() else {
            let _ = transport.close().await;
            return;
        };

        match frame {
            Ok(Frame::Text(text)) => inner.handle_frame(generation, &text),
            Ok(Frame::Closed(info)) => {
                inner.handle_closed(generation, info);
                return;
            }
            Err(e) => {
                inner.handle_error(generation, &e);
                let _ = transport.close().await;
                inner.handle_closed(generation, CloseInfo::abnormal(e.to_string()));
                return;
            }
        }
    }
}
