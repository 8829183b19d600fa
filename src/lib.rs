//! Multi-room WebSocket Chat Server Library
//!
//! Clients connect to `/chat/<room>`, get a generated display name and
//! see every line the other members of that room send, formatted as
//! `"<name> :: <text>"`.
//!
//! # Architecture
//! - `RoomRegistry` maps room names to rooms, creating them on first
//!   join and removing them when the last member leaves
//! - `Room` holds the membership and fans lines out, evicting members
//!   whose delivery fails
//! - Each connection has a `handler` task driving the registry
//! - The core only sees clients through the `Connection` trait
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use room_chat::{ChatServer, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     ChatServer::new(Config::default()).serve(listener).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod names;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use connection::{ClientHandle, Connection};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ErrorCode, ServerMessage};
pub use names::{NameAllocator, NameScheme};
pub use registry::RoomRegistry;
pub use room::{Delivery, Departure, Member, Room};
pub use server::ChatServer;
pub use types::{ConnectionId, DisplayName, RoomName};
