//! Basic type definitions for the counter room server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `RoomName`: validated room name taken from the connect path
//! - `CountBounds`: advisory min/max hints for the counter

use uuid::Uuid;

use crate::error::AppError;

/// Room used when the connect path does not name one
pub const DEFAULT_ROOM: &str = "main";

/// Longest accepted room name
const MAX_ROOM_NAME_LEN: usize = 64;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe connection identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name (1-64 characters of `[A-Za-z0-9_-]`)
///
/// Rooms are the unit of isolation: one counter, one connection set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Validate and wrap a room name
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let valid = !name.is_empty()
            && name.len() <= MAX_ROOM_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(AppError::InvalidRoomName(name.to_string()))
        }
    }

    /// Resolve the room from a request path
    ///
    /// Accepts `/parties/<party>/<room>` and `/<room>`, ignoring the query
    /// string and empty segments. A path that names no room (`/` or
    /// `/parties/<party>/`) resolves to [`DEFAULT_ROOM`]; extra segments
    /// are rejected.
    pub fn from_path(path: &str) -> Result<Self, AppError> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());

        let room = match (segments.next(), segments.next()) {
            (None, _) => None,
            (Some(room), None) => Some(room),
            (Some("parties"), Some(_party)) => segments.next(),
            (Some(_), Some(_)) => return Err(AppError::InvalidRoomName(path.to_string())),
        };

        if segments.next().is_some() {
            return Err(AppError::InvalidRoomName(path.to_string()));
        }

        match room {
            Some(segment) => Self::parse(segment),
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomName {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

/// Advisory counter limits sent to clients as `minCount`/`maxCount`
///
/// Display hints only: the room never clamps or rejects a mutation
/// because of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountBounds {
    min: i64,
    max: i64,
}

impl CountBounds {
    /// Create bounds, rejecting `min > max`
    pub fn new(min: i64, max: i64) -> Result<Self, AppError> {
        if min > max {
            return Err(AppError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
