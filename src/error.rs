//! Error types for the counter room server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Room already holds `capacity` connections
    #[error("Room is full ({capacity} connections)")]
    RoomFull { capacity: usize },

    /// Room name from the connect path is not acceptable
    #[error("Invalid room name: {0:?}")]
    InvalidRoomName(String),

    /// Advisory counter bounds with min above max
    #[error("Invalid bounds: min ({min}) > max ({max})")]
    InvalidBounds { min: i64, max: i64 },
}

/// Message send errors
///
/// Occurs when a connection's outbound buffer cannot take another message.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The writer is not keeping up and its buffer is full
    #[error("Channel full")]
    Full,
}
