//! Multi-room WebSocket Chat Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and serves until Ctrl-C.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use room_chat::{ChatServer, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_chat=info")),
        )
        .init();

    let config = Config::from_env()?;

    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        "WebSocket Chat Server listening on {} (names: {:?})",
        config.addr, config.name_scheme
    );

    let server = ChatServer::new(config);

    tokio::select! {
        _ = server.serve(listener) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down");
        }
    }

    Ok(())
}
