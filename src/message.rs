//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.
//!
//! Decoding is total: anything that is not a well-formed message of a known
//! `type` decodes to `None` and is dropped by the receiver.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::CountBounds;

/// Client → Server message
///
/// A counter mutation request. Carries no payload beyond its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Add one to the counter
    Increment,
    /// Subtract one from the counter
    Decrement,
    /// Set the counter back to zero
    Reset,
}

impl Action {
    /// Encode as a single JSON text frame
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame, returning `None` for anything unrecognized
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case
/// tags and camelCase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authoritative counter value, with optional advisory limits
    #[serde(rename_all = "camelCase")]
    Sync {
        count: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_count: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_count: Option<i64>,
    },
    /// Current and maximum number of connections in the room
    #[serde(rename_all = "camelCase")]
    ConnectionInfo {
        current_connections: usize,
        max_connections: usize,
    },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// Build a `sync` message, attaching hints when bounds are configured
    pub fn sync(count: i64, bounds: Option<CountBounds>) -> Self {
        ServerMessage::Sync {
            count,
            min_count: bounds.map(|b| b.min()),
            max_count: bounds.map(|b| b.max()),
        }
    }

    /// Build the `error` sent to a connection turned away at capacity
    pub fn room_full(capacity: usize) -> Self {
        ServerMessage::Error {
            code: ErrorCode::RoomFull,
            message: format!("Room is full (max {} connections)", capacity),
        }
    }

    /// Encode as a single JSON text frame
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame, returning `None` for anything unrecognized
    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room is at capacity; the connection is closed right after
    RoomFull,
}
