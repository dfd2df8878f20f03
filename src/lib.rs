//! Shared Counter Room Server Library
//!
//! A real-time counter server built with tokio-tungstenite: every room
//! holds one integer and pushes its value to all connected clients, plus a
//! client adapter that mirrors a room into local observable state.
//!
//! # Features
//! - WebSocket rooms addressed by path (`/parties/main/<room>`)
//! - `increment` / `decrement` / `reset` actions, broadcast to every member
//! - Connection counts pushed on join and leave
//! - Per-room capacity with an explicit `room_full` rejection
//! - Optional advisory min/max hints on `sync` messages
//! - Clients that stop reading are evicted instead of stalling their room
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - Each room is a `RoomServer` actor owning its counter and connections
//! - `RoomRegistry` maps room names to actors, spawning them on demand
//! - Each connection has a `handler` task communicating with its room
//! - No locks around room state - all access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use counter_room::{serve, RoomConfig, RoomRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:1999").await.unwrap();
//!     serve(listener, RoomRegistry::new(RoomConfig::default())).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{ClientState, ConnectionStatus, CounterClient};
pub use config::{ClientConfig, RoomConfig, ServerConfig};
pub use connection::{Connection, Outbound};
pub use error::{AppError, SendError};
pub use handler::{handle_connection, serve};
pub use message::{Action, ErrorCode, ServerMessage};
pub use registry::RoomRegistry;
pub use room::Room;
pub use server::{RoomCommand, RoomServer};
pub use types::{ClientId, CountBounds, RoomName};
