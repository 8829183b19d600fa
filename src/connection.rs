//! Connection handles
//!
//! The room core talks to clients only through the `Connection` trait.
//! `ClientHandle` is the implementation used by the WebSocket handler:
//! a cloneable sender into the client's outbound channel.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ConnectionId;

/// A client the core can deliver text to
///
/// Holding a clone does not keep the underlying socket open; closing it
/// is the handler's job.
pub trait Connection: Clone + Send + Sync + 'static {
    /// Identity of the underlying connection
    fn id(&self) -> ConnectionId;

    /// Deliver one line of text
    ///
    /// Any error is permanent for this connection.
    fn send_text(&self, text: String) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Handle to a connected client's outbound channel
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    sender: mpsc::Sender<ServerMessage>,
    send_timeout: Duration,
}

impl ClientHandle {
    /// Create a new handle with the given ID and sender channel
    pub fn new(id: ConnectionId, sender: mpsc::Sender<ServerMessage>, send_timeout: Duration) -> Self {
        Self {
            id,
            sender,
            send_timeout,
        }
    }

    /// Send a protocol message to this client
    ///
    /// Fails if the channel is closed (client disconnected) or stays
    /// full past the send timeout.
    pub async fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send_timeout(msg, self.send_timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Closed(_) => SendError::ChannelClosed,
                mpsc::error::SendTimeoutError::Timeout(_) => SendError::Timeout,
            })
    }
}

impl Connection for ClientHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send_text(&self, text: String) -> Result<(), SendError> {
        self.send(ServerMessage::Message { text }).await
    }
}
