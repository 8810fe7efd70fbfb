//! Room persistence
//!
//! Rooms are stored whole, JSON-encoded, under their id with a per-key TTL,
//! alongside an index of active room ids used by the cleanup sweep.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

use crate::{error::StoreError, state::Room};

/// Key-value repository of rooms with per-key expiry
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Fetch a room; keys past their TTL read as absent
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError>;

    /// Write the whole room and refresh its key TTL
    async fn save(&self, room: &Room, ttl: Duration) -> Result<(), StoreError>;

    /// Remove the room and its active index entry
    async fn delete(&self, room_id: &str) -> Result<(), StoreError>;

    /// Remove the room key only; the index entry stays for the cleanup sweep
    async fn evict(&self, room_id: &str) -> Result<(), StoreError>;

    async fn list_active_room_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Drop an id from the active index without touching the room key
    async fn deactivate(&self, room_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct StoredRoom {
    payload: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Keyspace {
    rooms: HashMap<String, StoredRoom>,
    active: HashSet<String>,
}

/// In-process store with the same encode/expire behaviour as a KV backend
#[derive(Debug, Default)]
pub struct MemoryRoomStore {
    keyspace: RwLock<Keyspace>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, expired ones excluded
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let keyspace = self.keyspace.read().await;
        keyspace
            .rooms
            .values()
            .filter(|stored| stored.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        {
            let keyspace = self.keyspace.read().await;
            match keyspace.rooms.get(room_id) {
                Some(stored) if stored.expires_at > Instant::now() => {
                    return Ok(Some(serde_json::from_str(&stored.payload)?));
                }
                None => return Ok(None),
                Some(_) => {}
            }
        }

        // Key outlived its TTL; drop the payload unless it was rewritten meanwhile
        let mut keyspace = self.keyspace.write().await;
        let now = Instant::now();
        if keyspace
            .rooms
            .get(room_id)
            .is_some_and(|stored| stored.expires_at <= now)
        {
            keyspace.rooms.remove(room_id);
            debug!("Evicted expired key {}", room_id);
        }
        Ok(None)
    }

    async fn save(&self, room: &Room, ttl: Duration) -> Result<(), StoreError> {
        let payload = serde_json::to_string(room)?;
        let expires_at = Instant::now() + ttl;

        let mut keyspace = self.keyspace.write().await;
        keyspace
            .rooms
            .insert(room.id.clone(), StoredRoom { payload, expires_at });
        keyspace.active.insert(room.id.clone());
        debug!("Saved room {} ({} timers)", room.id, room.timers().len());
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.rooms.remove(room_id);
        keyspace.active.remove(room_id);
        debug!("Deleted room {}", room_id);
        Ok(())
    }

    async fn evict(&self, room_id: &str) -> Result<(), StoreError> {
        self.keyspace.write().await.rooms.remove(room_id);
        debug!("Evicted room {}", room_id);
        Ok(())
    }

    async fn list_active_room_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.keyspace.read().await.active.clone())
    }

    async fn deactivate(&self, room_id: &str) -> Result<(), StoreError> {
        self.keyspace.write().await.active.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Timer, TimerSettings, TimerType};

    fn room(id: &str) -> Room {
        Room::new(id, chrono::Duration::hours(1))
    }

    #[tokio::test]
    async fn timer_settings_round_trip_through_store() {
        let store = MemoryRoomStore::new();
        let settings = TimerSettings {
            warning_time: 30_000,
            critical_time: 5_000,
            auto_reset: true,
            ..TimerSettings::default()
        };
        let mut room = room("ABC123");
        let timer = Timer::new("Talk", 60_000, TimerType::Countdown).with_settings(settings.clone());
        let timer_id = timer.id().to_string();
        room.add_timer(timer).unwrap();

        store.save(&room, Duration::from_secs(60)).await.unwrap();
        let loaded = store.load("ABC123").await.unwrap().unwrap();

        assert_eq!(loaded.timer(&timer_id).unwrap().settings(), &settings);
        assert_eq!(loaded, room);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_after_ttl_but_stay_indexed() {
        let store = MemoryRoomStore::new();
        store.save(&room("ABC123"), Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(store.load("ABC123").await.unwrap().is_none());
        assert!(store.is_empty().await);
        assert!(store.list_active_room_ids().await.unwrap().contains("ABC123"));

        store.deactivate("ABC123").await.unwrap();
        assert!(store.list_active_room_ids().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_dropped_on_read() {
        let store = MemoryRoomStore::new();
        for i in 0..100 {
            let id = format!("R{:05}", i);
            store.save(&room(&id), Duration::from_secs(10)).await.unwrap();
        }
        store.save(&room("KEEP01"), Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        for i in 0..100 {
            let id = format!("R{:05}", i);
            assert!(store.load(&id).await.unwrap().is_none());
            store.deactivate(&id).await.unwrap();
        }

        let keyspace = store.keyspace.read().await;
        assert_eq!(keyspace.rooms.len(), 1);
        assert!(keyspace.rooms.contains_key("KEEP01"));
        assert_eq!(keyspace.active.len(), 1);
    }

    #[tokio::test]
    async fn evict_keeps_index_entry() {
        let store = MemoryRoomStore::new();
        store.save(&room("ABC123"), Duration::from_secs(10)).await.unwrap();
        store.evict("ABC123").await.unwrap();

        assert!(store.load("ABC123").await.unwrap().is_none());
        assert!(store.is_empty().await);
        assert!(store.list_active_room_ids().await.unwrap().contains("ABC123"));
    }

    #[tokio::test]
    async fn delete_removes_key_and_index() {
        let store = MemoryRoomStore::new();
        store.save(&room("ABC123"), Duration::from_secs(10)).await.unwrap();
        store.delete("ABC123").await.unwrap();

        assert!(store.load("ABC123").await.unwrap().is_none());
        assert!(store.list_active_room_ids().await.unwrap().is_empty());
    }
}
