//! Message protocol definitions
//!
//! Clients send plain text frames; every text frame is one chat line.
//! The server answers with JSON frames built from Serde's tagged enum.

use serde::{Deserialize, Serialize};

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Joined a room, display name issued
    Hello { room: String, name: String },
    /// A line delivered to the room: `"<name> :: <text>"` or a system notice
    Message { text: String },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Binary frames are not part of the protocol
    UnsupportedFrame,
}

impl ServerMessage {
    pub fn unsupported_frame() -> Self {
        ServerMessage::Error {
            code: ErrorCode::UnsupportedFrame,
            message: "Only text frames are supported".to_string(),
        }
    }
}
