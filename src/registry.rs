//! Room registry
//!
//! Maps room names to running [`RoomServer`] actors. A room's actor is
//! spawned the first time a connection asks for it and lives for the rest
//! of the process, so each name has at most one live counter.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::config::RoomConfig;
use crate::room::Room;
use crate::server::{RoomCommand, RoomServer};
use crate::types::RoomName;

/// Channel buffer size for room commands
const ROOM_CHANNEL_BUFFER_SIZE: usize = 256;

/// Cloneable handle to the set of live rooms
#[derive(Debug, Clone)]
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: Arc<Mutex<HashMap<RoomName, mpsc::Sender<RoomCommand>>>>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the command channel for a room, starting its actor if needed
    ///
    /// Must be called from within a tokio runtime.
    pub async fn room(&self, name: &RoomName) -> mpsc::Sender<RoomCommand> {
        let mut rooms = self.rooms.lock().await;

        if let Some(sender) = rooms.get(name) {
            return sender.clone();
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(ROOM_CHANNEL_BUFFER_SIZE);
        let room = Room::new(name.clone(), self.config.capacity, self.config.bounds);
        tokio::spawn(RoomServer::new(room, cmd_rx).run());

        info!("Created room {}", name);
        rooms.insert(name.clone(), cmd_tx.clone());
        cmd_tx
    }

    /// Number of rooms created so far
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Outbound;
    use crate::message::ServerMessage;
    use crate::types::ClientId;

    async fn join(sender: &mpsc::Sender<RoomCommand>) -> (ClientId, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(32);
        let client_id = ClientId::new();
        sender
            .send(RoomCommand::Connect {
                client_id,
                sender: tx,
            })
            .await
            .unwrap();
        (client_id, rx)
    }

    #[tokio::test]
    async fn test_same_name_same_room() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let name = RoomName::parse("lobby").unwrap();

        let a = registry.room(&name).await;
        let b = registry.room(&name).await;

        assert!(a.same_channel(&b));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let registry = RoomRegistry::new(RoomConfig::default());
        let red = registry.room(&RoomName::parse("red").unwrap()).await;
        let blue = registry.room(&RoomName::parse("blue").unwrap()).await;
        assert_eq!(registry.room_count().await, 2);

        let (red_id, mut red_rx) = join(&red).await;
        let (_blue_id, mut blue_rx) = join(&blue).await;

        red.send(RoomCommand::Message {
            client_id: red_id,
            text: r#"{"type":"increment"}"#.to_string(),
        })
        .await
        .unwrap();

        // sync(0), info, info, then sync(1)
        let mut last = None;
        for _ in 0..4 {
            last = red_rx.recv().await;
        }
        assert_eq!(last, Some(Outbound::Message(ServerMessage::sync(1, None))));

        // Blue only saw its own join
        assert_eq!(
            blue_rx.recv().await,
            Some(Outbound::Message(ServerMessage::sync(0, None)))
        );
        blue_rx.recv().await;
        blue_rx.recv().await;
        assert!(blue_rx.try_recv().is_err());
    }
}
