//! Process-wide table of rooms, connections and the public directory.

use crate::actor::{RoomActor, RoomCommand};
use crate::config::ServerConfig;
use crate::protocol::{ConnectionId, RoomId, RoomSummary, ServerMessage};
use crate::room::{Room, RoomError, RoomMode};
use rek_core::Color;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

/// Prefix of bot room ids. Clients cannot create rooms under it.
pub const BOT_ROOM_PREFIX: &str = "BOT-";

/// Address of a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    instance: u64,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Room id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seats `conn` in the room and returns the assigned color.
    pub async fn join(&self, conn: ConnectionId) -> Result<Color, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join { conn, reply })?;
        rx.await.map_err(|_| RoomError::RoomNotFound)?
    }

    /// Queues a command. Fails once the room has shut down.
    pub fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.tx.send(command).map_err(|_| RoomError::RoomNotFound)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
struct Inner {
    config: ServerConfig,
    rooms: Mutex<HashMap<RoomId, RoomHandle>>,
    connections: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>,
    directory: Mutex<BTreeMap<RoomId, (u64, RoomSummary)>>,
    next_connection: AtomicU64,
    next_bot_room: AtomicU64,
    next_instance: AtomicU64,
}

/// Owns every room and connection outbox of one server.
///
/// Cloning is cheap; clones share the same tables.
#[derive(Debug, Clone)]
pub struct RoomRegistry {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[instrument(skip(config))]
    pub fn new(config: ServerConfig) -> Self {
        info!("Creating room registry");
        Self {
            inner: Arc::new(Inner {
                config,
                rooms: Mutex::new(HashMap::new()),
                connections: Mutex::new(HashMap::new()),
                directory: Mutex::new(BTreeMap::new()),
                next_connection: AtomicU64::new(1),
                next_bot_room: AtomicU64::new(1),
                next_instance: AtomicU64::new(1),
            }),
        }
    }

    /// Configuration shared by every room.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Registers a new connection and returns its outbox.
    #[instrument(skip(self))]
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ConnectionId(self.inner.next_connection.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.connections).insert(id, tx);
        info!(%id, "Connection opened");
        self.deliver(id, ServerMessage::Connected { connection_id: id });
        (id, rx)
    }

    /// Drops the outbox of `conn`.
    #[instrument(skip(self))]
    pub fn disconnect(&self, conn: ConnectionId) {
        if lock(&self.inner.connections).remove(&conn).is_some() {
            info!(%conn, "Connection closed");
        }
    }

    /// Pushes `message` to one connection.
    pub fn deliver(&self, to: ConnectionId, message: ServerMessage) {
        let sender = lock(&self.inner.connections).get(&to).cloned();
        match sender {
            Some(tx) => {
                if tx.send(message).is_err() {
                    debug!(%to, "Outbox closed, message dropped");
                }
            }
            None => debug!(%to, "Unknown connection, message dropped"),
        }
    }

    /// Returns the room `id`, starting it if absent.
    ///
    /// Ids under [`BOT_ROOM_PREFIX`] belong to bot rooms and are refused.
    #[instrument(skip(self))]
    pub fn create_room(&self, id: &str, is_public: bool) -> Result<RoomHandle, RoomError> {
        if id.starts_with(BOT_ROOM_PREFIX) {
            return Err(RoomError::ReservedId);
        }
        let mut rooms = lock(&self.inner.rooms);
        if let Some(handle) = rooms.get(id).filter(|h| !h.is_closed()) {
            debug!(room_id = id, "Room already exists");
            return Ok(handle.clone());
        }
        let room = Room::new(
            id.to_string(),
            is_public,
            RoomMode::Multiplayer,
            self.inner.config.room_settings(),
        );
        let handle = self.spawn(room);
        rooms.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Starts a private bot room with a fresh `BOT-<n>` id.
    #[instrument(skip(self))]
    pub fn create_bot_room(&self) -> RoomHandle {
        let mut rooms = lock(&self.inner.rooms);
        let id = loop {
            let n = self.inner.next_bot_room.fetch_add(1, Ordering::Relaxed);
            let id = format!("{BOT_ROOM_PREFIX}{n}");
            if !rooms.contains_key(&id) {
                break id;
            }
        };
        let room = Room::new(
            id.clone(),
            false,
            RoomMode::Bot,
            self.inner.config.room_settings(),
        );
        let handle = self.spawn(room);
        rooms.insert(id, handle.clone());
        handle
    }

    /// Looks up a live room.
    pub fn room(&self, id: &str) -> Option<RoomHandle> {
        lock(&self.inner.rooms)
            .get(id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// True while `handle` is the registered instance of its room.
    ///
    /// Turns false as soon as the room is destroyed, before its final
    /// notifications go out.
    pub fn is_current(&self, handle: &RoomHandle) -> bool {
        !handle.is_closed()
            && lock(&self.inner.rooms)
                .get(handle.id())
                .is_some_and(|h| h.instance == handle.instance)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        lock(&self.inner.rooms).len()
    }

    /// Forgets room `id` if it is still the given instance.
    #[instrument(skip(self))]
    pub(crate) fn remove_room(&self, id: &str, instance: u64) {
        let mut rooms = lock(&self.inner.rooms);
        if rooms.get(id).is_some_and(|h| h.instance == instance) {
            rooms.remove(id);
            info!(room_id = id, "Room removed");
        }
    }

    /// Records the directory entry that instance `instance` of room `id`
    /// publishes and pushes the new snapshot to every connection if it
    /// changed.
    ///
    /// A withdrawal only removes the entry of the same instance. Snapshots
    /// are delivered under the directory lock so every connection sees
    /// them in order.
    #[instrument(skip(self))]
    pub(crate) fn publish_summary(&self, id: &str, instance: u64, summary: Option<RoomSummary>) {
        let mut directory = lock(&self.inner.directory);
        let changed = match summary {
            Some(summary) => {
                let previous = directory.insert(id.to_string(), (instance, summary.clone()));
                previous.is_none_or(|(_, old)| old != summary)
            }
            None => {
                let owned = directory.get(id).is_some_and(|(owner, _)| *owner == instance);
                owned && directory.remove(id).is_some()
            }
        };
        if !changed {
            return;
        }

        let rooms: Vec<RoomSummary> = directory.values().map(|(_, s)| s.clone()).collect();
        debug!(listed = rooms.len(), "Directory changed");
        let outboxes: Vec<_> = lock(&self.inner.connections).values().cloned().collect();
        for outbox in outboxes {
            let _ = outbox.send(ServerMessage::RoomListUpdated {
                rooms: rooms.clone(),
            });
        }
    }

    /// Snapshot of the public directory.
    pub fn room_list(&self) -> Vec<RoomSummary> {
        lock(&self.inner.directory)
            .values()
            .map(|(_, summary)| summary.clone())
            .collect()
    }

    fn spawn(&self, room: Room) -> RoomHandle {
        let instance = self.inner.next_instance.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            id: room.id().to_string(),
            instance,
            tx: tx.clone(),
        };
        let actor = RoomActor::new(room, self.clone(), instance, tx);
        tokio::spawn(actor.run(rx));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, player_count: usize) -> Option<RoomSummary> {
        Some(RoomSummary {
            id: id.to_string(),
            player_count,
        })
    }

    fn last_snapshot(outbox: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<RoomSummary> {
        let mut last = None;
        while let Ok(message) = outbox.try_recv() {
            if let ServerMessage::RoomListUpdated { rooms } = message {
                last = Some(rooms);
            }
        }
        last.expect("at least one snapshot")
    }

    #[test]
    fn test_withdrawal_only_removes_own_instance() {
        let registry = RoomRegistry::new(ServerConfig::default());
        registry.publish_summary("R1", 1, summary("R1", 1));
        registry.publish_summary("R1", 2, summary("R1", 1));
        registry.publish_summary("R1", 1, None);
        assert_eq!(registry.room_list(), vec![summary("R1", 1).unwrap()]);

        registry.publish_summary("R1", 2, None);
        assert!(registry.room_list().is_empty());
    }

    #[test]
    fn test_unchanged_summary_is_not_pushed() {
        let registry = RoomRegistry::new(ServerConfig::default());
        let (_, mut outbox) = registry.connect();
        registry.publish_summary("R1", 1, summary("R1", 1));
        registry.publish_summary("R1", 1, summary("R1", 1));

        let pushes = std::iter::from_fn(|| outbox.try_recv().ok())
            .filter(|m| matches!(m, ServerMessage::RoomListUpdated { .. }))
            .count();
        assert_eq!(pushes, 1);
    }

    #[test]
    fn test_concurrent_publishers_leave_clients_current() {
        let registry = RoomRegistry::new(ServerConfig::default());
        let (_, mut outbox) = registry.connect();

        std::thread::scope(|scope| {
            for room in 0..4u64 {
                let registry = registry.clone();
                scope.spawn(move || {
                    let id = format!("R{room}");
                    for round in 0..50 {
                        let count = 1 + round % 2;
                        registry.publish_summary(&id, room, summary(&id, count));
                    }
                    if room % 2 == 0 {
                        registry.publish_summary(&id, room, None);
                    }
                });
            }
        });

        assert_eq!(last_snapshot(&mut outbox), registry.room_list());
        assert_eq!(registry.room_list().len(), 2);
    }

    #[test]
    fn test_client_cannot_claim_bot_ids() {
        let registry = RoomRegistry::new(ServerConfig::default());
        let err = registry.create_room("BOT-1", true).unwrap_err();
        assert_eq!(err, RoomError::ReservedId);
        assert_eq!(registry.room_count(), 0);
    }
}
