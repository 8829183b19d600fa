//! Error types for the chat server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Raised by the gateway, the server and configuration loading.
/// The room core never produces these: delivery failures are
/// handled as implicit leaves instead.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Room name failed validation
    #[error("Invalid room name: {0:?}")]
    InvalidRoomName(String),

    /// Bad configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Message send errors
///
/// Any of these is treated as permanent for the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The channel stayed full for longer than the send timeout
    #[error("Send timed out")]
    Timeout,
}
