//! Terminal client for a counter room
//!
//! Usage: `counter_client [host] [room]`
//!
//! Reads one command per line from stdin: `+` increments, `-` decrements,
//! `r` resets, `c` reconnects, `q` quits. Every state change is printed.

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use counter_room::config::DEFAULT_HOST;
use counter_room::{ClientConfig, ClientState, CounterClient, RoomName};

fn render(state: &ClientState) -> String {
    let connections = match (state.current_connections, state.max_connections) {
        (Some(current), Some(max)) if max > 0 => format!(" ({}/{})", current, max),
        _ => String::new(),
    };
    let error = state
        .connection_error
        .as_deref()
        .map(|e| format!(" error: {}", e))
        .unwrap_or_default();

    format!(
        "[{:?}{}] count = {} (doubled {}){}",
        state.status,
        connections,
        state.count,
        state.doubled(),
        error
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("counter_room=warn")),
        )
        .init();

    let host = env::args().nth(1).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let room = match env::args().nth(2) {
        Some(name) => RoomName::parse(&name)?,
        None => RoomName::default(),
    };

    let mut client = CounterClient::new(ClientConfig::new(host, room));
    let mut state = client.subscribe();
    println!("Joining {}", client.config().url());

    // Print every state change
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let line = render(&state.borrow_and_update());
            println!("{}", line);
        }
    });

    client.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "+" => client.increment(),
            "-" => client.decrement(),
            "r" => client.reset(),
            "c" => client.connect(),
            "q" => break,
            "" => {}
            other => eprintln!("unknown command {:?} (use + - r c q)", other),
        }
    }

    client.disconnect();
    Ok(())
}
