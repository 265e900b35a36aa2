//! Room membership table — tracks which connections belong to which rooms
//! and provides `broadcast()` to fan a frame out to every member of a room.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::messages::Frame;

/// Handle for a single WebSocket client.  The handler owns the
/// receiving half; the manager keeps the sending half.
pub type ClientSender = mpsc::UnboundedSender<Frame>;

/// A unique ID assigned to each connected WebSocket client.
pub type ClientId = u64;

#[derive(Debug)]
struct Client {
    tx: ClientSender,
    rooms: HashSet<String>,
}

/// Both directions of the membership relation. Every id in `rooms` has an
/// entry in `clients` listing that room, and no room set is ever empty.
#[derive(Debug, Default)]
struct Registry {
    clients: HashMap<ClientId, Client>,
    rooms: HashMap<String, BTreeSet<ClientId>>,
}

impl Registry {
    fn remove_member(&mut self, room: &str, client_id: ClientId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&client_id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }

    fn drop_client(&mut self, client_id: ClientId) -> Vec<String> {
        let Some(client) = self.clients.remove(&client_id) else {
            return Vec::new();
        };
        let mut left: Vec<String> = client.rooms.into_iter().collect();
        for room in &left {
            self.remove_member(room, client_id);
        }
        left.sort();
        left
    }
}

/// Manages room memberships of connected clients and provides broadcast.
///
/// Every operation takes the same lock and runs to completion, so broadcasts
/// racing to one room reach all of its members in the same order.
#[derive(Debug)]
pub struct RoomManager {
    registry: Mutex<Registry>,
    /// Monotonically increasing counter for client IDs.
    next_id: AtomicU64,
}

impl RoomManager {
    /// Create a new, empty manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new connection, returning (client_id, receiver). The
    /// connection starts in no room.
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut registry = self.registry.lock().await;
        registry.clients.insert(
            id,
            Client {
                tx,
                rooms: HashSet::new(),
            },
        );

        debug!(client_id = id, "WS client registered");
        (id, rx)
    }

    /// Add a client to a room. Returns false when the client was already a
    /// member or is not connected.
    pub async fn join(&self, client_id: ClientId, room: &str) -> bool {
        let mut registry = self.registry.lock().await;
        let Some(client) = registry.clients.get_mut(&client_id) else {
            return false;
        };
        if !client.rooms.insert(room.to_string()) {
            return false;
        }
        registry
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(client_id);

        debug!(room, client_id, "client joined room");
        true
    }

    /// Remove a client from a room. Returns false if it was not a member.
    pub async fn leave(&self, client_id: ClientId, room: &str) -> bool {
        let mut registry = self.registry.lock().await;
        let was_member = registry
            .clients
            .get_mut(&client_id)
            .is_some_and(|c| c.rooms.remove(room));
        if was_member {
            registry.remove_member(room, client_id);
            debug!(room, client_id, "client left room");
        }
        was_member
    }

    /// Send a frame to every member of a room, the originator included.
    /// Returns how many members it was handed to. Members whose connection
    /// has gone away are dropped from every room.
    pub async fn broadcast(&self, room: &str, frame: Frame) -> usize {
        let mut registry = self.registry.lock().await;
        let Some(members) = registry.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        let mut stale: Vec<ClientId> = Vec::new();
        for cid in members {
            match registry.clients.get(cid) {
                Some(client) if client.tx.send(frame.clone()).is_ok() => delivered += 1,
                _ => stale.push(*cid),
            }
        }

        for cid in stale {
            let rooms = registry.drop_client(cid);
            warn!(room, client_id = cid, ?rooms, "removed stale WS client");
        }

        debug!(room, delivered, "broadcast fanned out");
        delivered
    }

    /// Send a frame to a single client. Returns false if it is gone.
    pub async fn send_to(&self, client_id: ClientId, frame: Frame) -> bool {
        let registry = self.registry.lock().await;
        registry
            .clients
            .get(&client_id)
            .is_some_and(|c| c.tx.send(frame).is_ok())
    }

    /// Forget a client and remove it from every room it joined. Returns the
    /// rooms it was removed from. Calling it twice is harmless.
    pub async fn disconnect(&self, client_id: ClientId) -> Vec<String> {
        let mut registry = self.registry.lock().await;
        registry.drop_client(client_id)
    }

    /// Number of members of a room.
    pub async fn room_size(&self, room: &str) -> usize {
        let registry = self.registry.lock().await;
        registry.rooms.get(room).map_or(0, |m| m.len())
    }

    /// Rooms a client currently belongs to, sorted.
    pub async fn rooms_of(&self, client_id: ClientId) -> Vec<String> {
        let registry = self.registry.lock().await;
        let mut rooms: Vec<String> = registry
            .clients
            .get(&client_id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Total number of open connections, in a room or not.
    pub async fn total_connections(&self) -> usize {
        let registry = self.registry.lock().await;
        registry.clients.len()
    }

    /// Rooms with at least one member and their sizes, sorted by name.
    pub async fn active_rooms(&self) -> Vec<(String, usize)> {
        let registry = self.registry.lock().await;
        let mut rooms: Vec<(String, usize)> = registry
            .rooms
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();
        rooms.sort();
        rooms
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
