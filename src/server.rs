//! RoomServer Actor implementation
//!
//! One actor per room owns that room's counter and connections. Commands
//! from connection handlers arrive over an mpsc channel and are processed
//! to completion one at a time, so room state needs no locking.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{Connection, Outbound, CLOSE_ROOM_FULL, ROOM_FULL_REASON};
use crate::error::SendError;
use crate::message::{Action, ServerMessage};
use crate::room::Room;
use crate::types::ClientId;

/// Commands sent from handlers to a RoomServer actor
#[derive(Debug)]
pub enum RoomCommand {
    /// New socket wants into the room
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<Outbound>,
    },
    /// Raw text frame received from a client
    Message { client_id: ClientId, text: String },
    /// Socket closed
    Disconnect { client_id: ClientId },
}

/// The per-room actor
pub struct RoomServer {
    /// Room state owned by this actor
    room: Room,
    /// Command receiver channel
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomServer {
    /// Create a new RoomServer for the given room
    pub fn new(room: Room, receiver: mpsc::Receiver<RoomCommand>) -> Self {
        Self { room, receiver }
    }

    /// Run the RoomServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("Room {} started (capacity {})", self.room.name, self.room.capacity());

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!(
            "Room {} shutting down after {:?}",
            self.room.name,
            self.room.created_at.elapsed()
        );
    }

    /// Process a single command
    ///
    /// Outbound delivery never waits on a connection, so one slow client
    /// cannot hold up the room.
    pub async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connect { client_id, sender } => {
                self.handle_connect(Connection::new(client_id, sender));
            }
            RoomCommand::Message { client_id, text } => {
                self.handle_message(client_id, &text);
            }
            RoomCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Handle a connection attempt
    fn handle_connect(&mut self, conn: Connection) {
        let client_id = conn.id;

        if let Err(err) = self.room.admit(conn.clone()) {
            info!("Client {} rejected from room {}: {}", client_id, self.room.name, err);

            // Dropping `conn` here ends the writer even if the close never fit
            if let Err(e) = conn
                .send(ServerMessage::room_full(self.room.capacity()))
                .and_then(|()| conn.close(CLOSE_ROOM_FULL, ROOM_FULL_REASON))
            {
                debug!("Could not notify rejected client {}: {}", client_id, e);
            }
            return;
        }

        info!(
            "Client {} joined room {} ({}/{})",
            client_id,
            self.room.name,
            self.room.connection_count(),
            self.room.capacity()
        );

        let mut lagging = Vec::new();
        if let Err(e) = conn
            .send(self.room.sync_message())
            .and_then(|()| conn.send(self.room.connection_info()))
        {
            warn!("Failed to send initial state to {}: {}", client_id, e);
            if matches!(e, SendError::Full) {
                lagging.push(client_id);
            }
        }

        lagging.extend(self.fan_out(&self.room.connection_info()));
        self.evict(lagging);
    }

    /// Handle an incoming text frame
    fn handle_message(&mut self, client_id: ClientId, text: &str) {
        if !self.room.contains(client_id) {
            debug!("Ignoring message from non-member {}", client_id);
            return;
        }

        let Some(action) = Action::decode(text) else {
            debug!("Dropping unrecognized message from {}: {:?}", client_id, text);
            return;
        };

        let count = self.room.apply_action(action);
        debug!(
            "Client {} sent {:?} in room {}, count = {}",
            client_id, action, self.room.name, count
        );

        self.broadcast(self.room.sync_message());
    }

    /// Handle socket close
    fn handle_disconnect(&mut self, client_id: ClientId) {
        if self.room.remove(client_id).is_none() {
            return;
        }

        info!(
            "Client {} left room {} ({}/{})",
            client_id,
            self.room.name,
            self.room.connection_count(),
            self.room.capacity()
        );

        self.broadcast(self.room.connection_info());
    }

    /// Helper: Send a message to every admitted connection
    ///
    /// Connections whose buffer is full are evicted afterwards.
    fn broadcast(&mut self, msg: ServerMessage) {
        let lagging = self.fan_out(&msg);
        self.evict(lagging);
    }

    /// Queue `msg` on every connection, returning the ones that are full
    ///
    /// A closed connection is only logged; its handler reports the
    /// disconnect.
    fn fan_out(&self, msg: &ServerMessage) -> Vec<ClientId> {
        let mut lagging = Vec::new();
        for conn in self.room.connections() {
            match conn.send(msg.clone()) {
                Ok(()) => {}
                Err(SendError::Full) => lagging.push(conn.id),
                Err(e) => warn!("Broadcast to {} failed: {}", conn.id, e),
            }
        }
        lagging
    }

    /// Drop connections that stopped keeping up and tell the rest
    ///
    /// Removing a connection drops its sender, which ends its writer task
    /// and closes the socket. The follow-up `connection_info` can itself
    /// find more full buffers, so this repeats until none are left.
    fn evict(&mut self, mut lagging: Vec<ClientId>) {
        while !lagging.is_empty() {
            let mut removed = false;
            for client_id in lagging.drain(..) {
                if self.room.remove(client_id).is_some() {
                    warn!(
                        "Evicting client {} from room {}: outbound buffer full",
                        client_id, self.room.name
                    );
                    removed = true;
                }
            }

            if removed {
                lagging = self.fan_out(&self.room.connection_info());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::types::RoomName;

    /// Upper bound for a single command; the actor must never wait on a client
    const STEP: Duration = Duration::from_secs(2);

    fn test_server(capacity: usize) -> RoomServer {
        let (_tx, rx) = mpsc::channel(32);
        RoomServer::new(Room::new(RoomName::default(), capacity, None), rx)
    }

    async fn connect(server: &mut RoomServer) -> (ClientId, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(32);
        let client_id = ClientId::new();
        server
            .handle_command(RoomCommand::Connect {
                client_id,
                sender: tx,
            })
            .await;
        (client_id, rx)
    }

    async fn send(server: &mut RoomServer, client_id: ClientId, text: &str) {
        server
            .handle_command(RoomCommand::Message {
                client_id,
                text: text.to_string(),
            })
            .await;
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn sync(count: i64) -> Outbound {
        Outbound::Message(ServerMessage::sync(count, None))
    }

    fn info(current: usize, max: usize) -> Outbound {
        Outbound::Message(ServerMessage::ConnectionInfo {
            current_connections: current,
            max_connections: max,
        })
    }

    #[tokio::test]
    async fn test_connect_sends_state_then_broadcasts_info() {
        let mut server = test_server(10);
        let (_c1, mut rx1) = connect(&mut server).await;

        assert_eq!(drain(&mut rx1), vec![sync(0), info(1, 10), info(1, 10)]);

        let (_c2, mut rx2) = connect(&mut server).await;

        assert_eq!(drain(&mut rx1), vec![info(2, 10)]);
        assert_eq!(drain(&mut rx2), vec![sync(0), info(2, 10), info(2, 10)]);
    }

    #[tokio::test]
    async fn test_capacity_rejection() {
        let mut server = test_server(2);
        let (c1, mut rx1) = connect(&mut server).await;
        let (_c2, mut rx2) = connect(&mut server).await;
        drain(&mut rx1);
        drain(&mut rx2);

        let (c3, mut rx3) = connect(&mut server).await;

        assert_eq!(
            drain(&mut rx3),
            vec![
                Outbound::Message(ServerMessage::room_full(2)),
                Outbound::Close {
                    code: CLOSE_ROOM_FULL,
                    reason: ROOM_FULL_REASON.to_string(),
                },
            ]
        );
        assert!(!server.room().contains(c3));

        // No broadcast for a rejection
        assert!(drain(&mut rx1).is_empty());
        assert!(drain(&mut rx2).is_empty());

        // Closing the rejected socket changes nothing
        server
            .handle_command(RoomCommand::Disconnect { client_id: c3 })
            .await;
        assert!(drain(&mut rx1).is_empty());

        // After C1 leaves, C4 gets in
        server
            .handle_command(RoomCommand::Disconnect { client_id: c1 })
            .await;
        assert_eq!(drain(&mut rx2), vec![info(1, 2)]);

        let (c4, mut rx4) = connect(&mut server).await;
        assert!(server.room().contains(c4));
        assert_eq!(drain(&mut rx4), vec![sync(0), info(2, 2), info(2, 2)]);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let mut server = test_server(10);
        let (_c1, mut rx1) = connect(&mut server).await;
        let (c2, mut rx2) = connect(&mut server).await;
        let (_c3, mut rx3) = connect(&mut server).await;
        drain(&mut rx1);
        drain(&mut rx2);
        drain(&mut rx3);

        send(&mut server, c2, r#"{"type":"increment"}"#).await;

        assert_eq!(drain(&mut rx1), vec![sync(1)]);
        assert_eq!(drain(&mut rx2), vec![sync(1)]);
        assert_eq!(drain(&mut rx3), vec![sync(1)]);
    }

    #[tokio::test]
    async fn test_counter_scenario() {
        let mut server = test_server(10);
        let (c1, mut rx1) = connect(&mut server).await;
        assert_eq!(drain(&mut rx1)[0], sync(0));

        send(&mut server, c1, r#"{"type":"increment"}"#).await;
        assert_eq!(drain(&mut rx1), vec![sync(1)]);

        send(&mut server, c1, r#"{"type":"decrement"}"#).await;
        send(&mut server, c1, r#"{"type":"decrement"}"#).await;
        assert_eq!(drain(&mut rx1), vec![sync(0), sync(-1)]);

        send(&mut server, c1, r#"{"type":"reset"}"#).await;
        assert_eq!(drain(&mut rx1), vec![sync(0)]);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let mut server = test_server(10);
        let (c1, mut rx1) = connect(&mut server).await;
        drain(&mut rx1);

        for text in ["", "nope", r#"{"type":"multiply"}"#, r#"{"count":5}"#] {
            send(&mut server, c1, text).await;
        }

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(server.room().counter(), 0);
    }

    #[tokio::test]
    async fn test_message_from_non_member_is_ignored() {
        let mut server = test_server(10);
        let (_c1, mut rx1) = connect(&mut server).await;
        drain(&mut rx1);

        send(&mut server, ClientId::new(), r#"{"type":"increment"}"#).await;

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(server.room().counter(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_connection() {
        let mut server = test_server(10);
        let (c1, mut rx1) = connect(&mut server).await;
        let (_c2, rx2) = connect(&mut server).await;
        drain(&mut rx1);

        // C2's writer went away without a Disconnect yet
        drop(rx2);

        send(&mut server, c1, r#"{"type":"increment"}"#).await;
        assert_eq!(drain(&mut rx1), vec![sync(1)]);
    }

    #[tokio::test]
    async fn test_stalled_newcomer_is_evicted() {
        let mut server = test_server(10);
        let (c1, mut rx1) = connect(&mut server).await;
        drain(&mut rx1);

        // Room for one message, and nobody ever reads it
        let (stalled_tx, _stalled_rx) = mpsc::channel(1);
        let stalled = ClientId::new();
        timeout(
            STEP,
            server.handle_command(RoomCommand::Connect {
                client_id: stalled,
                sender: stalled_tx,
            }),
        )
        .await
        .expect("connect of a stalled client blocked the room");

        assert!(!server.room().contains(stalled));
        assert_eq!(drain(&mut rx1), vec![info(2, 10), info(1, 10)]);

        timeout(STEP, send(&mut server, c1, r#"{"type":"increment"}"#))
            .await
            .expect("increment blocked by a stalled connection");
        assert_eq!(drain(&mut rx1), vec![sync(1)]);
    }

    #[tokio::test]
    async fn test_member_that_stops_reading_is_evicted() {
        let mut server = test_server(10);
        let (c1, mut rx1) = connect(&mut server).await;
        drain(&mut rx1);

        // Fits the join messages plus one more
        let (slow_tx, mut slow_rx) = mpsc::channel(4);
        let slow = ClientId::new();
        server
            .handle_command(RoomCommand::Connect {
                client_id: slow,
                sender: slow_tx,
            })
            .await;
        assert!(server.room().contains(slow));
        drain(&mut rx1);

        for _ in 0..2 {
            timeout(STEP, send(&mut server, c1, r#"{"type":"increment"}"#))
                .await
                .expect("increment blocked by a slow connection");
        }

        // C1 saw both updates, then the slow client leaving
        assert_eq!(drain(&mut rx1), vec![sync(1), sync(2), info(1, 10)]);
        assert!(!server.room().contains(slow));

        // What was queued is still delivered, then the writer's channel ends
        assert_eq!(
            drain(&mut slow_rx),
            vec![sync(0), info(2, 10), info(2, 10), sync(1)]
        );
        assert_eq!(slow_rx.recv().await, None);

        // Its late disconnect is a no-op
        server
            .handle_command(RoomCommand::Disconnect { client_id: slow })
            .await;
        assert!(drain(&mut rx1).is_empty());
    }
}
