//! Room bookkeeping — which live connections are in which channel rooms.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tracks room membership for all connections on this process.
pub struct RoomRegistry {
    /// Map of channel_id → connection ids in that room
    rooms: Arc<RwLock<HashMap<Uuid, HashSet<Uuid>>>>,
    /// Map of connection id → channel ids it has joined
    connections: Arc<RwLock<HashMap<Uuid, HashSet<Uuid>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a connection to a channel room. Idempotent.
    pub async fn join(&self, connection_id: Uuid, channel_id: Uuid) -> usize {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(channel_id).or_default();
        room.insert(connection_id);
        let size = room.len();
        drop(rooms);

        self.connections
            .write()
            .await
            .entry(connection_id)
            .or_default()
            .insert(channel_id);

        size
    }

    /// Remove a connection from a channel room. Always succeeds.
    pub async fn leave(&self, connection_id: Uuid, channel_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&channel_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                rooms.remove(&channel_id);
            }
        }
        drop(rooms);

        if let Some(joined) = self.connections.write().await.get_mut(&connection_id) {
            joined.remove(&channel_id);
        }
    }

    /// Remove a connection from every room it had joined (disconnect path).
    pub async fn disconnect(&self, connection_id: Uuid) {
        let joined = self.connections.write().await.remove(&connection_id);
        if let Some(joined) = joined {
            let mut rooms = self.rooms.write().await;
            for channel_id in joined {
                if let Some(room) = rooms.get_mut(&channel_id) {
                    room.remove(&connection_id);
                    if room.is_empty() {
                        rooms.remove(&channel_id);
                    }
                }
            }
        }
    }

    /// Whether a connection currently sits in a room.
    pub async fn is_joined(&self, connection_id: Uuid, channel_id: Uuid) -> bool {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .is_some_and(|joined| joined.contains(&channel_id))
    }

    /// Number of local connections in a room.
    pub async fn room_size(&self, channel_id: Uuid) -> usize {
        self.rooms
            .read()
            .await
            .get(&channel_id)
            .map_or(0, HashSet::len)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_and_leave_track_room_size() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let channel = Uuid::now_v7();

        assert_eq!(registry.join(conn, channel).await, 1);
        assert!(registry.is_joined(conn, channel).await);

        // Joining twice doesn't double-count.
        assert_eq!(registry.join(conn, channel).await, 1);

        registry.leave(conn, channel).await;
        assert!(!registry.is_joined(conn, channel).await);
        assert_eq!(registry.room_size(channel).await, 0);

        // Leaving a room you're not in always succeeds.
        registry.leave(conn, channel).await;
    }

    #[tokio::test]
    async fn disconnect_clears_every_room() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let other = Uuid::new_v4();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();

        registry.join(conn, a).await;
        registry.join(conn, b).await;
        registry.join(other, a).await;

        registry.disconnect(conn).await;

        assert!(!registry.is_joined(conn, a).await);
        assert!(!registry.is_joined(conn, b).await);
        assert_eq!(registry.room_size(a).await, 1);
        assert_eq!(registry.room_size(b).await, 0);
    }
}
