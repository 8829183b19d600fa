//! Room registry
//!
//! Maps room names to live rooms. Rooms are created on first join and
//! removed as soon as their last member is gone, so every entry in the
//! map has at least one member.
//!
//! Lock order is always registry, then room. Joins and leaves hold the
//! registry write lock for their whole duration, which makes creation,
//! first join and teardown atomic with respect to each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::names::NameAllocator;
use crate::room::{Delivery, Departure, Room};
use crate::types::{ConnectionId, DisplayName, RoomName};

/// All active rooms, keyed by name
#[derive(Debug)]
pub struct RoomRegistry<C> {
    rooms: RwLock<HashMap<RoomName, Arc<Room<C>>>>,
    names: NameAllocator,
}

impl<C: Connection> RoomRegistry<C> {
    pub fn new(names: NameAllocator) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            names,
        }
    }

    /// Join a room, creating it if needed
    pub async fn join(&self, room: &RoomName, conn: C) -> DisplayName {
        let mut rooms = self.rooms.write().await;
        let entry = rooms.entry(room.clone()).or_insert_with(|| {
            info!("Room {} created", room);
            Arc::new(Room::new(room.clone()))
        });
        entry.join(conn, &self.names).await
    }

    /// Leave a room, tearing it down if it became empty
    ///
    /// Leaving a room that does not exist, or that the connection is not
    /// in, reports `was_present() == false`.
    pub async fn leave(&self, room: &RoomName, id: ConnectionId) -> Departure {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get(room) else {
            return Departure {
                name: None,
                now_empty: true,
            };
        };

        let departure = entry.leave(id).await;
        if departure.now_empty {
            rooms.remove(room);
            info!("Room {} deleted (empty)", room);
        }
        departure
    }

    /// Look up a live room
    pub async fn get(&self, room: &RoomName) -> Option<Arc<Room<C>>> {
        self.rooms.read().await.get(room).cloned()
    }

    /// Broadcast a member's line to the rest of the room
    ///
    /// A missing room means zero recipients, and the sender is
    /// reported absent since it cannot be a member of it.
    pub async fn broadcast(&self, room: &RoomName, sender: ConnectionId, text: &str) -> Delivery {
        let Some(entry) = self.get(room).await else {
            debug!("Broadcast to missing room {}", room);
            return Delivery {
                sender_absent: true,
                ..Delivery::default()
            };
        };

        let delivery = entry.broadcast(sender, text).await;
        if delivery.now_empty {
            self.reap(&entry).await;
        }
        delivery
    }

    /// Send a system line to the room
    pub async fn announce(
        &self,
        room: &RoomName,
        except: Option<ConnectionId>,
        text: &str,
    ) -> Delivery {
        let Some(entry) = self.get(room).await else {
            return Delivery::default();
        };

        let delivery = entry.announce(except, text).await;
        if delivery.now_empty {
            self.reap(&entry).await;
        }
        delivery
    }

    /// Remove a room emptied by evictions
    ///
    /// Only removes the entry if it is still this exact room and still
    /// empty; a join may have refilled it, or it may already be replaced.
    async fn reap(&self, room: &Arc<Room<C>>) {
        let mut rooms = self.rooms.write().await;
        let Some(current) = rooms.get(room.name()) else {
            return;
        };

        if Arc::ptr_eq(current, room) && room.is_empty().await {
            rooms.remove(room.name());
            info!("Room {} deleted (empty)", room.name());
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn contains(&self, room: &RoomName) -> bool {
        self.rooms.read().await.contains_key(room)
    }
}
