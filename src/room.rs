//! Room struct definition
//!
//! A room is the set of connections currently joined under one name.
//! It owns the membership map and performs fan-out with per-recipient
//! failure isolation.

use std::collections::HashMap;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::names::NameAllocator;
use crate::types::{ConnectionId, DisplayName, RoomName};

/// Random draws tried before falling back to a numbered suffix
const MAX_NAME_ATTEMPTS: usize = 8;

/// One participant of a room
#[derive(Debug, Clone)]
pub struct Member<C> {
    pub conn: C,
    pub name: DisplayName,
}

/// Result of removing a connection from a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// Name the connection had, if it was a member
    pub name: Option<DisplayName>,
    /// The room has no members left
    pub now_empty: bool,
}

impl Departure {
    pub fn was_present(&self) -> bool {
        self.name.is_some()
    }
}

/// Result of a fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients that accepted the line
    pub delivered: usize,
    /// Members removed because their send failed
    pub evicted: Vec<DisplayName>,
    /// The room has no members left
    pub now_empty: bool,
    /// The sender was not a member, so nothing was sent
    pub sender_absent: bool,
}

/// Chat room
///
/// Membership is guarded by its own lock. Sends happen on a snapshot
/// taken under the lock, never while holding it.
#[derive(Debug)]
pub struct Room<C> {
    name: RoomName,
    members: Mutex<HashMap<ConnectionId, Member<C>>>,
}

impl<C: Connection> Room<C> {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Register a connection under a freshly allocated name
    ///
    /// Joining with a connection that is already a member is a no-op
    /// returning the name it already has.
    pub async fn join(&self, conn: C, names: &NameAllocator) -> DisplayName {
        let mut members = self.members.lock().await;
        let id = conn.id();

        if let Some(existing) = members.get(&id) {
            debug!("Connection {} already in room {}", id, self.name);
            return existing.name.clone();
        }

        let name = unique_name(&members, names);
        members.insert(
            id,
            Member {
                conn,
                name: name.clone(),
            },
        );

        info!(
            "{} joined room {} ({} members)",
            name,
            self.name,
            members.len()
        );
        name
    }

    /// Remove a connection
    ///
    /// Leaving twice is not an error; the second call reports
    /// `was_present() == false`.
    pub async fn leave(&self, id: ConnectionId) -> Departure {
        let mut members = self.members.lock().await;
        let name = members.remove(&id).map(|m| m.name);

        if let Some(name) = &name {
            info!("{} left room {}", name, self.name);
        }

        Departure {
            name,
            now_empty: members.is_empty(),
        }
    }

    /// Deliver `"<sender name> :: <text>"` to every member except the sender
    ///
    /// A sender that is not (or no longer) a member has no name to be
    /// attributed to, so nothing is delivered and `sender_absent` is set.
    pub async fn broadcast(&self, sender: ConnectionId, text: &str) -> Delivery {
        let (line, recipients) = {
            let members = self.members.lock().await;
            let Some(from) = members.get(&sender) else {
                debug!("Connection {} is not in room {}", sender, self.name);
                return Delivery {
                    now_empty: members.is_empty(),
                    sender_absent: true,
                    ..Delivery::default()
                };
            };
            (
                format!("{} :: {}", from.name, text),
                snapshot(&members, Some(sender)),
            )
        };

        self.deliver(line, recipients).await
    }

    /// Deliver a system line verbatim to every member except `except`
    pub async fn announce(&self, except: Option<ConnectionId>, text: &str) -> Delivery {
        let recipients = {
            let members = self.members.lock().await;
            snapshot(&members, except)
        };

        self.deliver(text.to_string(), recipients).await
    }

    /// Send to a snapshot of members, then evict the ones that failed
    async fn deliver(&self, line: String, recipients: Vec<C>) -> Delivery {
        let results = join_all(
            recipients
                .iter()
                .map(|conn| conn.send_text(line.clone())),
        )
        .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (conn, result) in recipients.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Delivery to {} in room {} failed: {}",
                        conn.id(),
                        self.name,
                        e
                    );
                    failed.push(conn.id());
                }
            }
        }

        let mut members = self.members.lock().await;
        let evicted: Vec<DisplayName> = failed
            .iter()
            .filter_map(|id| members.remove(id))
            .map(|m| m.name)
            .collect();

        for name in &evicted {
            info!("{} dropped from room {}", name, self.name);
        }

        Delivery {
            delivered,
            evicted,
            now_empty: members.is_empty(),
            sender_absent: false,
        }
    }

    pub async fn member_count(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Name a connection is shown under, if it is a member
    pub async fn display_name(&self, id: ConnectionId) -> Option<DisplayName> {
        self.members.lock().await.get(&id).map(|m| m.name.clone())
    }

    pub async fn member_names(&self) -> Vec<DisplayName> {
        self.members
            .lock()
            .await
            .values()
            .map(|m| m.name.clone())
            .collect()
    }
}

/// Clone out the connections to send to
fn snapshot<C: Connection>(
    members: &HashMap<ConnectionId, Member<C>>,
    except: Option<ConnectionId>,
) -> Vec<C> {
    members
        .iter()
        .filter(|(id, _)| Some(**id) != except)
        .map(|(_, m)| m.conn.clone())
        .collect()
}

/// Draw a name no current member is using
fn unique_name<C>(
    members: &HashMap<ConnectionId, Member<C>>,
    names: &NameAllocator,
) -> DisplayName {
    let taken = |candidate: &DisplayName| members.values().any(|m| &m.name == candidate);

    for _ in 0..MAX_NAME_ATTEMPTS {
        let name = names.allocate();
        if !taken(&name) {
            return name;
        }
    }

    let base = names.allocate();
    let mut suffix = members.len() + 1;
    loop {
        let name = DisplayName(format!("{}-{}", base, suffix));
        if !taken(&name) {
            return name;
        }
        suffix += 1;
    }
}
