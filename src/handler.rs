//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, room
//! routing, and bidirectional communication with the room's RoomServer.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::connection::Outbound;
use crate::error::AppError;
use crate::registry::RoomRegistry;
use crate::server::RoomCommand;
use crate::types::{ClientId, RoomName};

/// Per-connection outbound buffer; a room evicts a client that fills it
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// Longest a single frame write may take before the socket is given up
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections forever, spawning a handler task per socket
pub async fn serve(listener: TcpListener, registry: RoomRegistry) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Accepted connection from {}", addr);
                let registry = registry.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, registry).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake (resolving the room from the request
/// path), joins the room and pumps frames until either side closes.
pub async fn handle_connection(stream: TcpStream, registry: RoomRegistry) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, picking the room out of the path
    let mut room_name = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match RoomName::from_path(req.uri().path()) {
            Ok(name) => {
                room_name = Some(name);
                Ok(resp)
            }
            Err(e) => {
                warn!("Rejecting handshake from {}: {}", peer_addr, e);
                let mut err = ErrorResponse::new(Some(e.to_string()));
                *err.status_mut() = StatusCode::BAD_REQUEST;
                Err(err)
            }
        }
    })
    .await?;

    let Some(room_name) = room_name else {
        return Ok(());
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Generate client ID
    let client_id = ClientId::new();
    info!("Client {} connected from {} to room {}", client_id, peer_addr, room_name);

    // Create channel for room -> client messages
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER_SIZE);

    // Ask the room for admission
    let room_tx = registry.room(&room_name).await;
    if room_tx
        .send(RoomCommand::Connect {
            client_id,
            sender: out_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register client {} - room {} closed", client_id, room_name);
        return Err(AppError::ChannelSend);
    }

    // Clone room_tx for read task
    let room_tx_read = room_tx.clone();

    // Spawn read task (WebSocket -> RoomCommand)
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let cmd = RoomCommand::Message { client_id, text };
                    if room_tx_read.send(cmd).await.is_err() {
                        debug!("Room closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", client_id);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong replies are handled automatically by tungstenite
                }
                Ok(_) => {
                    debug!("Ignoring non-text frame from {}", client_id);
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Spawn write task (Outbound -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            match outbound {
                Outbound::Message(msg) => match msg.encode() {
                    Ok(json) => {
                        match tokio::time::timeout(WRITE_TIMEOUT, ws_sender.send(Message::Text(json)))
                            .await
                        {
                            Ok(Ok(())) => {}
                            Ok(Err(_)) => {
                                debug!("WebSocket send failed, ending write task");
                                return;
                            }
                            Err(_) => {
                                warn!("WebSocket send timed out, ending write task");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                    }
                },
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = tokio::time::timeout(
                        WRITE_TIMEOUT,
                        ws_sender.send(Message::Close(Some(frame))),
                    )
                    .await;
                    debug!("Closed connection with code {}", code);
                    return;
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = tokio::time::timeout(WRITE_TIMEOUT, ws_sender.close()).await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }

    // Send disconnect command
    let _ = room_tx.send(RoomCommand::Disconnect { client_id }).await;

    info!("Client {} disconnected from room {}", client_id, room_name);

    Ok(())
}
