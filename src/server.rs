//! ChatServer implementation
//!
//! Owns the room registry for the lifetime of the process and spawns one
//! handler task per accepted connection. All handlers share the registry
//! by reference.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::connection::ClientHandle;
use crate::handler::handle_connection;
use crate::names::NameAllocator;
use crate::registry::RoomRegistry;

/// The chat server
pub struct ChatServer {
    registry: Arc<RoomRegistry<ClientHandle>>,
    config: Arc<Config>,
}

impl ChatServer {
    /// Create a server with an empty registry
    pub fn new(config: Config) -> Self {
        let names = NameAllocator::new(config.name_scheme);
        Self {
            registry: Arc::new(RoomRegistry::new(names)),
            config: Arc::new(config),
        }
    }

    /// Shared handle to the room registry
    pub fn registry(&self) -> Arc<RoomRegistry<ClientHandle>> {
        self.registry.clone()
    }

    /// Accept connections until the listener fails permanently
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn serve(self, listener: TcpListener) {
        info!("ChatServer started");

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let registry = self.registry.clone();
                    let config = self.config.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry, config).await {
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
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use super::*;
    use crate::message::ServerMessage;
    use crate::names::NameScheme;
    use crate::types::RoomName;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start() -> (SocketAddr, Arc<RoomRegistry<ClientHandle>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = ChatServer::new(Config {
            name_scheme: NameScheme::Counter,
            ..Config::default()
        });
        let registry = server.registry();
        tokio::spawn(server.serve(listener));
        (addr, registry)
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        loop {
            let frame = timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    async fn hello_name(ws: &mut Client) -> String {
        match next_message(ws).await {
            ServerMessage::Hello { name, .. } => name,
            other => panic!("expected hello, got {:?}", other),
        }
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_two_clients_chat_over_websocket() {
        let (addr, registry) = start().await;

        let (mut a, _) = connect_async(format!("ws://{}/chat/room1", addr))
            .await
            .unwrap();
        let name_a = hello_name(&mut a).await;

        let (mut b, _) = connect_async(format!("ws://{}/chat/room1", addr))
            .await
            .unwrap();
        let name_b = hello_name(&mut b).await;
        assert_ne!(name_a, name_b);

        assert_eq!(
            next_message(&mut a).await,
            ServerMessage::Message {
                text: format!("{} :: joined the chat", name_b)
            }
        );

        a.send(Message::Text("hi".into())).await.unwrap();
        assert_eq!(
            next_message(&mut b).await,
            ServerMessage::Message {
                text: format!("{} :: hi", name_a)
            }
        );

        b.close(None).await.unwrap();
        assert_eq!(
            next_message(&mut a).await,
            ServerMessage::Message {
                text: format!("{} :: left the chat", name_b)
            }
        );

        a.close(None).await.unwrap();
        let room1 = RoomName::parse("room1").unwrap();
        wait_until(|| {
            let registry = registry.clone();
            let room1 = room1.clone();
            async move { !registry.contains(&room1).await }
        })
        .await;
    }

    #[tokio::test]
    async fn test_departure_is_announced_to_every_remaining_member() {
        let (addr, _registry) = start().await;
        let url = format!("ws://{}/chat/room3", addr);

        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        hello_name(&mut a).await;
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();
        let name_b = hello_name(&mut b).await;
        next_message(&mut a).await;
        let (mut c, _) = connect_async(url.as_str()).await.unwrap();
        let name_c = hello_name(&mut c).await;
        next_message(&mut a).await;
        next_message(&mut b).await;

        c.close(None).await.unwrap();

        let left = ServerMessage::Message {
            text: format!("{} :: left the chat", name_c),
        };
        assert_eq!(next_message(&mut a).await, left);
        assert_eq!(next_message(&mut b).await, left);

        b.close(None).await.unwrap();
        assert_eq!(
            next_message(&mut a).await,
            ServerMessage::Message {
                text: format!("{} :: left the chat", name_b)
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_path_is_rejected() {
        let (addr, _registry) = start().await;

        let result = connect_async(format!("ws://{}/items/1", addr)).await;

        assert!(result.is_err());
    }
}
