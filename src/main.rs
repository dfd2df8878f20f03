//! Shared Counter Room Server - Entry Point
//!
//! Starts the TCP listener and serves counter rooms over WebSocket.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use counter_room::{serve, RoomRegistry, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=counter_room=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("counter_room=info")),
        )
        .init();

    let config = ServerConfig::from_env();

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("Counter room server listening on {}", config.addr);
    info!(
        "Room capacity {}, advisory bounds {:?}",
        config.room.capacity, config.room.bounds
    );

    serve(listener, RoomRegistry::new(config.room)).await;

    Ok(())
}
