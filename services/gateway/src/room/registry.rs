use super::types::Room;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub type SharedRoom = Arc<Mutex<Room>>;

/// Owns the outer `roomCode -> Room` map. Every mutating operation on a
/// given room's contents goes through the `Mutex<Room>` the registry hands
/// back — the `RwLock` here only guards insertion/removal of whole rooms,
/// matching the teacher's `BroadcastRegistry`/`ReceiverSessionRegistry`
/// double-locking shape (read lock first, write lock only if absent).
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, SharedRoom>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, room_code: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(room_code).cloned()
    }

    /// Returns the existing room for `room_code`, or creates it via `init`
    /// (spec §4.3: "idempotent").
    pub async fn get_or_init(&self, room_code: &str, init: impl FnOnce() -> Room) -> SharedRoom {
        if let Some(room) = self.rooms.read().await.get(room_code) {
            return room.clone();
        }
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(room_code) {
            return room.clone();
        }
        let room = Arc::new(Mutex::new(init()));
        rooms.insert(room_code.to_owned(), room.clone());
        room
    }

    /// Drops a room from memory once its last live user has left. The
    /// durable row is untouched (spec §3: "erased from memory when the
    /// last live user leaves").
    pub async fn remove_if_empty(&self, room_code: &str) {
        let is_empty = match self.rooms.read().await.get(room_code) {
            Some(room) => room.lock().await.users.is_empty(),
            None => return,
        };
        if is_empty {
            self.rooms.write().await.remove(room_code);
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Socket ids whose user has been present in their room longer than
    /// `max_age`, for the idle-socket sweeper (spec §4.5).
    pub async fn find_idle_sockets(&self, max_age: Duration) -> Vec<String> {
        let rooms = self.rooms.read().await;
        let mut idle = Vec::new();
        for room in rooms.values() {
            let room = room.lock().await;
            for user in room.users.values() {
                if user.joined_at.elapsed() > max_age {
                    idle.push(user.socket_id.clone());
                }
            }
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::RoomMeta;
    use sport_clock::Sport;
    use uuid::Uuid;

    fn new_room(code: &str) -> Room {
        Room::new(Uuid::new_v4(), code.to_owned(), Sport::Basketball, RoomMeta::default())
    }

    #[tokio::test]
    async fn get_or_init_is_idempotent_for_concurrent_callers() {
        let registry = RoomRegistry::new();
        let room_a = registry.get_or_init("demo", || new_room("demo")).await;
        let room_b = registry.get_or_init("demo", || new_room("demo")).await;
        assert!(Arc::ptr_eq(&room_a, &room_b));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn remove_if_empty_drops_only_empty_rooms() {
        let registry = RoomRegistry::new();
        let room = registry.get_or_init("demo", || new_room("demo")).await;
        room.lock().await.add_user(
            "socket-1".to_owned(),
            "alice".to_owned(),
            Uuid::new_v4(),
            None,
        );
        registry.remove_if_empty("demo").await;
        assert_eq!(registry.room_count().await, 1, "non-empty room must survive");

        room.lock().await.remove_user("socket-1");
        registry.remove_if_empty("demo").await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_room() {
        let registry = RoomRegistry::new();
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn find_idle_sockets_only_returns_users_past_the_age_threshold() {
        let registry = RoomRegistry::new();
        let room = registry.get_or_init("demo", || new_room("demo")).await;
        room.lock()
            .await
            .add_user("fresh".to_owned(), "alice".to_owned(), Uuid::new_v4(), None);

        let idle = registry.find_idle_sockets(Duration::from_secs(0)).await;
        assert_eq!(idle, vec!["fresh".to_owned()]);

        let none_idle = registry.find_idle_sockets(Duration::from_secs(3600)).await;
        assert!(none_idle.is_empty());
    }
}
