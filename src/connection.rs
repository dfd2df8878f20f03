//! Connection handle held by a room
//!
//! Represents an admitted (or admission-pending) socket together with the
//! channel feeding its writer task.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Application close code used when a room rejects a connection at capacity
pub const CLOSE_ROOM_FULL: u16 = 4000;

/// Close reason paired with [`CLOSE_ROOM_FULL`]
pub const ROOM_FULL_REASON: &str = "Room is full";

/// Instruction for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialize and send as a text frame
    Message(ServerMessage),
    /// Send a close frame and stop writing
    Close { code: u16, reason: String },
}

/// A live link into a room
#[derive(Debug, Clone)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ClientId,
    /// Room → socket writer channel
    sender: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Create a connection with the given ID and writer channel
    pub fn new(id: ClientId, sender: mpsc::Sender<Outbound>) -> Self {
        Self { id, sender }
    }

    /// Queue a message for this connection without waiting
    ///
    /// Fails with [`SendError::Full`] when the writer has fallen behind and
    /// with [`SendError::ChannelClosed`] once the client is gone.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.push(Outbound::Message(msg))
    }

    /// Ask the writer to close the socket with the given code and reason
    pub fn close(&self, code: u16, reason: &str) -> Result<(), SendError> {
        self.push(Outbound::Close {
            code,
            reason: reason.to_string(),
        })
    }

    fn push(&self, outbound: Outbound) -> Result<(), SendError> {
        self.sender.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_send() {
        let (tx, mut rx) = mpsc::channel(32);
        let conn = Connection::new(ClientId::new(), tx);

        conn.send(ServerMessage::sync(4, None)).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Message(ServerMessage::sync(4, None)))
        );
    }

    #[tokio::test]
    async fn test_connection_close() {
        let (tx, mut rx) = mpsc::channel(32);
        let conn = Connection::new(ClientId::new(), tx);

        conn.close(CLOSE_ROOM_FULL, ROOM_FULL_REASON).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Close {
                code: 4000,
                reason: "Room is full".to_string(),
            })
        );
    }

    #[test]
    fn test_connection_send_after_drop() {
        let (tx, rx) = mpsc::channel(32);
        let conn = Connection::new(ClientId::new(), tx);
        drop(rx);

        assert!(matches!(
            conn.send(ServerMessage::sync(0, None)),
            Err(SendError::ChannelClosed)
        ));
    }

    #[test]
    fn test_connection_send_to_full_buffer() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = Connection::new(ClientId::new(), tx);

        conn.send(ServerMessage::sync(1, None)).unwrap();
        assert!(matches!(
            conn.send(ServerMessage::sync(2, None)),
            Err(SendError::Full)
        ));
        assert!(matches!(
            conn.close(CLOSE_ROOM_FULL, ROOM_FULL_REASON),
            Err(SendError::Full)
        ));

        // Nothing was dropped from what did fit
        assert_eq!(
            rx.try_recv().ok(),
            Some(Outbound::Message(ServerMessage::sync(1, None)))
        );
        assert!(rx.try_recv().is_err());
    }
}
