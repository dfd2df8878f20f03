//! Client sync adapter
//!
//! [`CounterClient`] owns a single connection to one room. It mirrors the
//! server's pushes into a [`ClientState`] published on a `watch` channel and
//! forwards user intents as [`Action`]s. Local state is only ever written
//! from server messages; every change round-trips through the room.
//!
//! # Example
//! ```ignore
//! let mut client = CounterClient::new(ClientConfig::default());
//! let mut state = client.subscribe();
//! client.connect();
//!
//! state.wait_for(|s| s.is_connected()).await?;
//! client.increment();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::message::{Action, ServerMessage};

/// Error text published when the transport fails
pub const CONNECTION_ERROR: &str = "WebSocket connection error";

/// Transport status as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Local mirror of the room
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    /// Last counter value pushed by the server
    pub count: i64,
    pub status: ConnectionStatus,
    pub current_connections: Option<usize>,
    pub max_connections: Option<usize>,
    /// Last error reported by the server or the transport
    pub connection_error: Option<String>,
    /// Advisory lower limit, display only
    pub min_count: Option<i64>,
    /// Advisory upper limit, display only
    pub max_count: Option<i64>,
}

impl ClientState {
    /// Fold a server message into local state
    pub fn apply(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Sync {
                count,
                min_count,
                max_count,
            } => {
                self.count = count;
                self.min_count = min_count;
                self.max_count = max_count;
            }
            ServerMessage::ConnectionInfo {
                current_connections,
                max_connections,
            } => {
                self.current_connections = Some(current_connections);
                self.max_connections = Some(max_connections);
            }
            ServerMessage::Error { message, .. } => {
                self.connection_error = Some(message);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn doubled(&self) -> i64 {
        self.count.saturating_mul(2)
    }

    pub fn is_positive(&self) -> bool {
        self.count > 0
    }

    /// Whether an increment button should be enabled
    pub fn can_increment(&self) -> bool {
        self.is_connected() && self.max_count.map_or(true, |max| self.count < max)
    }

    /// Whether a decrement button should be enabled
    pub fn can_decrement(&self) -> bool {
        self.is_connected() && self.min_count.map_or(true, |min| self.count > min)
    }
}

/// Write access to the shared state for one transport session
///
/// Goes quiet once the session is deactivated, so a stale transport task
/// can never overwrite the state of a newer connection.
#[derive(Debug, Clone)]
struct Publisher {
    state: Arc<watch::Sender<ClientState>>,
    active: Arc<AtomicBool>,
}

impl Publisher {
    fn update(&self, f: impl FnOnce(&mut ClientState)) {
        if self.active.load(Ordering::Acquire) {
            self.state.send_modify(f);
        }
    }
}

/// A live (or in-flight) connection owned by the client
#[derive(Debug)]
struct Session {
    active: Arc<AtomicBool>,
    actions: mpsc::UnboundedSender<Action>,
    task: JoinHandle<()>,
}

/// Client-side adapter for one counter room
#[derive(Debug)]
pub struct CounterClient {
    config: ClientConfig,
    state: Arc<watch::Sender<ClientState>>,
    session: Option<Session>,
}

impl CounterClient {
    /// Create a disconnected client for the configured room
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ClientState::default());
        Self {
            config,
            state: Arc::new(state),
            session: None,
        }
    }

    /// Where this client connects
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Open the connection in the background
    ///
    /// A no-op while a connection is still live. Must be called from within
    /// a tokio runtime.
    pub fn connect(&mut self) {
        if self
            .session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
        {
            debug!("Already connected to {}", self.config.room);
            return;
        }

        // A finished session only needs silencing
        if let Some(old) = self.session.take() {
            old.active.store(false, Ordering::Release);
        }

        let active = Arc::new(AtomicBool::new(true));
        let publisher = Publisher {
            state: Arc::clone(&self.state),
            active: Arc::clone(&active),
        };
        publisher.update(|s| {
            s.status = ConnectionStatus::Connecting;
            s.connection_error = None;
        });

        let (actions, action_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_transport(self.config.url(), publisher, action_rx));

        self.session = Some(Session {
            active,
            actions,
            task,
        });
    }

    /// Close the connection; calling it again is a no-op
    pub fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        session.active.store(false, Ordering::Release);
        // Dropping the action sender makes the transport send its close frame
        drop(session.actions);

        self.state
            .send_modify(|s| s.status = ConnectionStatus::Disconnected);
        info!("Disconnected from room {}", self.config.room);
    }

    pub fn increment(&self) {
        self.send_action(Action::Increment);
    }

    pub fn decrement(&self) {
        self.send_action(Action::Decrement);
    }

    pub fn reset(&self) {
        self.send_action(Action::Reset);
    }

    /// Forward an action if connected, otherwise drop it
    fn send_action(&self, action: Action) {
        if !self.state.borrow().is_connected() {
            debug!("Not connected, dropping {:?}", action);
            return;
        }

        if let Some(session) = &self.session {
            let _ = session.actions.send(action);
        }
    }
}

impl Drop for CounterClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Background transport loop for one session
async fn run_transport(
    url: String,
    publisher: Publisher,
    mut actions: mpsc::UnboundedReceiver<Action>,
) {
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", url, e);
            publisher.update(|s| {
                s.status = ConnectionStatus::Error;
                s.connection_error = Some(CONNECTION_ERROR.to_string());
            });
            return;
        }
    };

    info!("Connected to {}", url);
    publisher.update(|s| s.status = ConnectionStatus::Connected);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            action = actions.recv() => {
                let Some(action) = action else {
                    // Adapter disconnected or dropped
                    let _ = ws_sender.close().await;
                    debug!("Transport closed by client");
                    return;
                };

                let json = match action.encode() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize action: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    warn!("Send failed: {}", e);
                    publisher.update(|s| {
                        s.status = ConnectionStatus::Error;
                        s.connection_error = Some(CONNECTION_ERROR.to_string());
                    });
                    return;
                }
            }
            frame = ws_receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ServerMessage::decode(&text) {
                        Some(msg) => publisher.update(|s| s.apply(msg)),
                        None => debug!("Ignoring unrecognized server message: {:?}", text),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server closed connection: {:?}", frame);
                        publisher.update(|s| s.status = ConnectionStatus::Disconnected);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        publisher.update(|s| {
                            s.status = ConnectionStatus::Error;
                            s.connection_error = Some(CONNECTION_ERROR.to_string());
                        });
                        return;
                    }
                    None => {
                        publisher.update(|s| s.status = ConnectionStatus::Disconnected);
                        return;
                    }
                }
            }
        }
    }
}
