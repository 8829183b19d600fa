//! WebSocket connection handler
//!
//! Handles individual client connections: handshake and room routing,
//! then bidirectional communication between the socket and the room
//! registry.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::connection::{ClientHandle, Connection};
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::registry::RoomRegistry;
use crate::types::{ConnectionId, DisplayName, RoomName};

/// Path prefix of the chat endpoint: `/chat/<room>`
pub const CHAT_PATH_PREFIX: &str = "/chat/";

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, joins the requested room, pumps
/// messages until either side goes away, then leaves the room.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<RoomRegistry<ClientHandle>>,
    config: Arc<Config>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, rejecting anything but /chat/<room>
    let mut requested_room = None;
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        match room_from_path(req.uri().path()) {
            Some(room) => {
                requested_room = Some(room);
                Ok(resp)
            }
            None => Err(not_found(req.uri().path())),
        }
    })
    .await?;
    let Some(room) = requested_room else {
        return Ok(());
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);

    // The room holds the only strong sender. Once this connection is
    // dropped from the room, for any reason, the write task sees the
    // channel close and the connection shuts down.
    let own_tx = msg_tx.downgrade();
    let handle = ClientHandle::new(conn_id, msg_tx, config.send_timeout);

    let name = registry.join(&room, handle).await;
    info!(
        "Connection {} from {} joined room {} as {}",
        conn_id, peer_addr, room, name
    );

    // Hello goes out before the write task starts, so it precedes
    // anything already queued for this client
    let hello = ServerMessage::Hello {
        room: room.to_string(),
        name: name.to_string(),
    };
    if let Err(e) = send_json(&mut ws_sender, &hello).await {
        registry.leave(&room, conn_id).await;
        return Err(e);
    }

    let delivery = registry
        .announce(&room, Some(conn_id), &format!("{} :: joined the chat", name))
        .await;
    announce_departures(&registry, &room, delivery.evicted).await;

    // Spawn read task (WebSocket -> room)
    let read_registry = registry.clone();
    let read_room = room.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let delivery = read_registry.broadcast(&read_room, conn_id, &text).await;
                    debug!(
                        "Message from {} delivered to {} members",
                        conn_id, delivery.delivered
                    );
                    announce_departures(&read_registry, &read_room, delivery.evicted).await;
                    if delivery.sender_absent {
                        debug!("Connection {} is no longer in room {}", conn_id, read_room);
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    let Some(tx) = own_tx.upgrade() else {
                        break;
                    };
                    if tx.send(ServerMessage::unsupported_frame()).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(_) => {
                    // Ping/Pong are answered by tungstenite
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    // Spawn write task (client channel -> WebSocket)
    let write_timeout = config.write_timeout;
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            match tokio::time::timeout(write_timeout, ws_sender.send(Message::Text(json.into())))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("WebSocket send failed for {}: {}", conn_id, e);
                    break;
                }
                Err(_) => {
                    warn!("WebSocket write to {} timed out", conn_id);
                    break;
                }
            }
        }
        debug!("Write task ended for {}", conn_id);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }
    read_task.abort();
    write_task.abort();

    let departure = registry.leave(&room, conn_id).await;
    if !departure.now_empty {
        if let Some(name) = departure.name {
            announce_departures(&registry, &room, vec![name]).await;
        }
    }

    info!("Connection {} left room {}", conn_id, room);

    Ok(())
}

/// Tell the room about members that are gone
///
/// Announcing can itself evict members whose channels failed; those
/// are announced in turn until nobody else drops out.
pub async fn announce_departures<C: Connection>(
    registry: &RoomRegistry<C>,
    room: &RoomName,
    mut departed: Vec<DisplayName>,
) {
    while let Some(name) = departed.pop() {
        let delivery = registry
            .announce(room, None, &format!("{} :: left the chat", name))
            .await;
        departed.extend(delivery.evicted);
    }
}

/// Extract the room name from a request path
///
/// Only `/chat/<room>` with a non-empty, single-segment room is accepted.
pub fn room_from_path(path: &str) -> Option<RoomName> {
    let name = path.strip_prefix(CHAT_PATH_PREFIX)?;
    if name.contains('/') {
        return None;
    }
    RoomName::parse(name).ok()
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("No chat room at {}", path)));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Serialize and write one message straight to the socket
async fn send_json<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), AppError>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}
