//! Room state
//!
//! The authoritative counter for one room together with its admitted
//! connections and capacity limit.

use std::collections::HashMap;
use std::time::Instant;

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::{Action, ServerMessage};
use crate::types::{ClientId, CountBounds, RoomName};

/// Default number of simultaneous connections per room
pub const DEFAULT_CAPACITY: usize = 10;

/// Shared counter room
///
/// Holds at most `capacity` connections. The counter starts at zero and
/// only changes through [`Room::apply_action`].
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Current counter value
    counter: i64,
    /// Admitted connections: ClientId -> Connection
    connections: HashMap<ClientId, Connection>,
    /// Maximum simultaneous connections
    capacity: usize,
    /// Advisory limits forwarded to clients, never enforced
    bounds: Option<CountBounds>,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create an empty room with the counter at zero
    pub fn new(name: RoomName, capacity: usize, bounds: Option<CountBounds>) -> Self {
        Self {
            name,
            counter: 0,
            connections: HashMap::new(),
            capacity,
            bounds,
            created_at: Instant::now(),
        }
    }

    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply a counter action and return the new value
    ///
    /// Never fails; bounds are not checked here. Saturates at the `i64`
    /// limits.
    pub fn apply_action(&mut self, action: Action) -> i64 {
        self.counter = match action {
            Action::Increment => self.counter.saturating_add(1),
            Action::Decrement => self.counter.saturating_sub(1),
            Action::Reset => 0,
        };
        self.counter
    }

    /// Check if room is at capacity
    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.capacity
    }

    /// Admit a connection
    ///
    /// Returns the new connection count, or `RoomFull` if the room already
    /// holds `capacity` connections.
    pub fn admit(&mut self, conn: Connection) -> Result<usize, AppError> {
        if self.is_full() {
            return Err(AppError::RoomFull {
                capacity: self.capacity,
            });
        }

        self.connections.insert(conn.id, conn);
        Ok(self.connections.len())
    }

    /// Remove a connection; a no-op if it is not present
    pub fn remove(&mut self, client_id: ClientId) -> Option<Connection> {
        self.connections.remove(&client_id)
    }

    /// Check if a connection is admitted in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.connections.contains_key(&client_id)
    }

    /// Get the number of admitted connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Iterate over admitted connections (no particular order)
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Snapshot of the counter as a `sync` message
    pub fn sync_message(&self) -> ServerMessage {
        ServerMessage::sync(self.counter, self.bounds)
    }

    /// Snapshot of the connection counts as a `connection_info` message
    pub fn connection_info(&self) -> ServerMessage {
        ServerMessage::ConnectionInfo {
            current_connections: self.connections.len(),
            max_connections: self.capacity,
        }
    }
}
