//! Runtime configuration
//!
//! Server settings come from argv and the process environment:
//! - bind address: first CLI argument, else `BIND_ADDR`, else `127.0.0.1:1999`
//! - `MAX_CONNECTIONS`: room capacity (positive integer, default 10)
//! - `COUNTER_MIN` / `COUNTER_MAX`: advisory counter hints (both or neither)

use std::env;

use tracing::warn;

use crate::room::DEFAULT_CAPACITY;
use crate::types::{CountBounds, RoomName};

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:1999";

/// Default host for clients
pub const DEFAULT_HOST: &str = "localhost:1999";

/// Party segment of the connect path
const PARTY: &str = "main";

/// Per-room settings shared by every room the server creates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomConfig {
    /// Maximum simultaneous connections per room
    pub capacity: usize,
    /// Advisory hints attached to `sync` messages
    pub bounds: Option<CountBounds>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            bounds: None,
        }
    }
}

impl RoomConfig {
    /// Build from raw environment values
    pub fn from_vars(
        max_connections: Option<&str>,
        counter_min: Option<&str>,
        counter_max: Option<&str>,
    ) -> Self {
        Self {
            capacity: parse_capacity(max_connections),
            bounds: parse_bounds(counter_min, counter_max),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub addr: String,
    /// Settings applied to each room
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Read settings from the command line and environment
    pub fn from_env() -> Self {
        let addr = env::args()
            .nth(1)
            .or_else(|| env::var("BIND_ADDR").ok())
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());

        let max_connections = env::var("MAX_CONNECTIONS").ok();
        let counter_min = env::var("COUNTER_MIN").ok();
        let counter_max = env::var("COUNTER_MAX").ok();

        Self {
            addr,
            room: RoomConfig::from_vars(
                max_connections.as_deref(),
                counter_min.as_deref(),
                counter_max.as_deref(),
            ),
        }
    }
}

/// Parse the room capacity, falling back to the default when the value is
/// absent, not a number, or not positive
pub fn parse_capacity(raw: Option<&str>) -> usize {
    match raw.map(str::trim).map(str::parse::<i64>) {
        Some(Ok(n)) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_CAPACITY),
        Some(_) => {
            warn!("Invalid MAX_CONNECTIONS {:?}, using {}", raw, DEFAULT_CAPACITY);
            DEFAULT_CAPACITY
        }
        None => DEFAULT_CAPACITY,
    }
}

/// Parse advisory counter hints; both must be present and `min <= max`
pub fn parse_bounds(min: Option<&str>, max: Option<&str>) -> Option<CountBounds> {
    let (min, max) = match (min, max) {
        (None, None) => return None,
        (Some(min), Some(max)) => (min.trim().parse::<i64>(), max.trim().parse::<i64>()),
        _ => {
            warn!("COUNTER_MIN and COUNTER_MAX must be set together, ignoring");
            return None;
        }
    };

    let (Ok(min), Ok(max)) = (min, max) else {
        warn!("COUNTER_MIN/COUNTER_MAX are not integers, ignoring");
        return None;
    };

    match CountBounds::new(min, max) {
        Ok(bounds) => Some(bounds),
        Err(e) => {
            warn!("{}, ignoring", e);
            None
        }
    }
}

/// Client connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host[:port]` of the room server
    pub host: String,
    /// Room to join
    pub room: RoomName,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            room: RoomName::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, room: RoomName) -> Self {
        Self {
            host: host.into(),
            room,
        }
    }

    /// WebSocket URL for the configured room
    pub fn url(&self) -> String {
        format!("ws://{}/parties/{}/{}", self.host, PARTY, self.room)
    }
}
