//! Room lifecycle on top of the room store
//!
//! `RoomService` owns the per-room mutation locks. Every read-modify-write of a
//! room runs while holding that room's lock, which makes the lock the single
//! owner of the room's state between `load` and `save`.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde::Deserialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    state::{is_hex_color, Room, RoomSettings, RoomStats, FONT_FAMILIES, MAX_TIMERS_LIMIT},
};

use super::{
    room_ids::{generate_room_id, is_valid_room_id},
    store::RoomStore,
};

/// Attempts at finding an unused room id before giving up
pub const ROOM_ID_ATTEMPTS: usize = 10;

type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Partial update of room settings; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsUpdate {
    pub max_timers: Option<u32>,
    pub auto_cleanup: Option<bool>,
    pub allow_viewer_messages: Option<bool>,
    pub primary_color: Option<String>,
    pub background_color: Option<String>,
    pub font_family: Option<String>,
}

pub struct RoomService {
    store: Arc<dyn RoomStore>,
    room_ttl: Duration,
    default_max_timers: u32,
    generate_id: IdGenerator,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>, room_ttl: Duration, default_max_timers: u32) -> Self {
        Self {
            store,
            room_ttl,
            default_max_timers: default_max_timers.clamp(1, MAX_TIMERS_LIMIT),
            generate_id: Box::new(generate_room_id),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the room id source
    pub fn with_id_generator(mut self, generate: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.generate_id = Box::new(generate);
        self
    }

    pub fn room_ttl(&self) -> Duration {
        self.room_ttl
    }

    fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.room_ttl).unwrap_or_else(|_| chrono::Duration::days(365))
    }

    /// Take the mutation lock of a room
    pub async fn lock(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(room_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Lock a room and load it, failing if it is absent or expired
    pub async fn lock_room(&self, room_id: &str) -> Result<(OwnedMutexGuard<()>, Room)> {
        if !is_valid_room_id(room_id) {
            return Err(Error::RoomNotFound(room_id.to_string()));
        }

        let guard = self.lock(room_id).await;
        match self.get_room(room_id).await {
            Ok(Some(room)) => Ok((guard, room)),
            Ok(None) => {
                drop(guard);
                self.release_lock(room_id);
                Err(Error::RoomNotFound(room_id.to_string()))
            }
            Err(e) => {
                drop(guard);
                self.release_lock(room_id);
                Err(e)
            }
        }
    }

    /// Forget a room's lock once nobody holds or waits on it
    fn release_lock(&self, room_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(room_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(room_id);
        }
    }

    pub fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub async fn create_room(&self) -> Result<Room> {
        for attempt in 1..=ROOM_ID_ATTEMPTS {
            let room_id = (self.generate_id)();
            if self.store.load(&room_id).await?.is_some() {
                debug!("Room id {} taken (attempt {})", room_id, attempt);
                continue;
            }

            let mut room = Room::new(room_id, self.expiry_window());
            room.settings.max_timers = self.default_max_timers;
            self.store.save(&room, self.room_ttl).await?;

            info!("Created room {}", room.id);
            return Ok(room);
        }

        warn!("Gave up generating a room id after {} attempts", ROOM_ID_ATTEMPTS);
        Err(Error::RoomIdGeneration {
            attempts: ROOM_ID_ATTEMPTS,
        })
    }

    /// Load a room; expired rooms are evicted and read as absent
    ///
    /// The active index entry is left for the cleanup sweep, which releases
    /// the room's subscribers and tickers.
    pub async fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        if !is_valid_room_id(room_id) {
            return Ok(None);
        }

        match self.store.load(room_id).await? {
            Some(room) if room.is_expired() => {
                info!("Room {} expired, evicting", room_id);
                self.store.evict(room_id).await?;
                Ok(None)
            }
            room => Ok(room),
        }
    }

    pub async fn require_room(&self, room_id: &str) -> Result<Room> {
        self.get_room(room_id)
            .await?
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))
    }

    pub async fn room_exists(&self, room_id: &str) -> Result<bool> {
        Ok(self.get_room(room_id).await?.is_some())
    }

    /// Persist the room and push its expiry one TTL into the future
    pub async fn save_room(&self, room: &mut Room) -> Result<()> {
        room.refresh_expiry(self.expiry_window());
        self.store.save(room, self.room_ttl).await?;
        Ok(())
    }

    /// Remove a room from the store; callers hold the room lock
    pub async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.store.delete(room_id).await?;
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(room_id);
        }
        info!("Deleted room {}", room_id);
        Ok(())
    }

    /// Keep a room alive without changing its content
    pub async fn touch_room(&self, room_id: &str) -> Result<Room> {
        let (_guard, mut room) = self.lock_room(room_id).await?;
        room.touch();
        self.save_room(&mut room).await?;
        Ok(room)
    }

    pub async fn update_settings(&self, room_id: &str, update: RoomSettingsUpdate) -> Result<Room> {
        let (_guard, mut room) = self.lock_room(room_id).await?;
        let settings = apply_settings(&room, update)?;
        room.settings = settings;
        self.save_room(&mut room).await?;

        info!("Updated settings of room {}", room_id);
        Ok(room)
    }

    /// Mirror presence counts into the stored room
    pub async fn update_stats(&self, room_id: &str, stats: RoomStats) -> Result<Room> {
        let (_guard, mut room) = self.lock_room(room_id).await?;
        room.stats = stats;
        self.save_room(&mut room).await?;
        Ok(room)
    }

    /// Reconcile the active index against the store, returning removed ids
    pub async fn cleanup_expired_rooms(&self) -> Result<Vec<String>> {
        let active = self.store.list_active_room_ids().await?;
        let mut removed = Vec::new();

        for room_id in &active {
            let _guard = self.lock(room_id).await;
            match self.store.load(room_id).await? {
                None => {
                    self.store.deactivate(room_id).await?;
                    removed.push(room_id.clone());
                }
                Some(room) if room.is_expired() => {
                    self.store.delete(room_id).await?;
                    removed.push(room_id.clone());
                }
                Some(_) => {}
            }
        }

        self.prune_locks(&active, &removed);
        if !removed.is_empty() {
            info!("Cleaned up {} expired rooms", removed.len());
        }
        Ok(removed)
    }

    fn prune_locks(&self, active: &HashSet<String>, removed: &[String]) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|room_id, lock| {
            let live = active.contains(room_id) && !removed.contains(room_id);
            live || Arc::strong_count(lock) > 1
        });
    }
}

fn apply_settings(room: &Room, update: RoomSettingsUpdate) -> Result<RoomSettings> {
    let mut settings = room.settings.clone();

    if let Some(max_timers) = update.max_timers {
        if !(1..=MAX_TIMERS_LIMIT).contains(&max_timers) {
            return Err(Error::InvalidArgument(format!(
                "maxTimers must be between 1 and {}",
                MAX_TIMERS_LIMIT
            )));
        }
        if (max_timers as usize) < room.timers().len() {
            return Err(Error::InvalidArgument(format!(
                "room already holds {} timers",
                room.timers().len()
            )));
        }
        settings.max_timers = max_timers;
    }

    if let Some(color) = update.primary_color {
        if !is_hex_color(&color) {
            return Err(Error::InvalidArgument(
                "primaryColor must be a valid hex color".to_string(),
            ));
        }
        settings.primary_color = color;
    }

    if let Some(color) = update.background_color {
        if !is_hex_color(&color) {
            return Err(Error::InvalidArgument(
                "backgroundColor must be a valid hex color".to_string(),
            ));
        }
        settings.background_color = color;
    }

    if let Some(font_family) = update.font_family {
        if !FONT_FAMILIES.contains(&font_family.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "fontFamily must be one of {}",
                FONT_FAMILIES.join(", ")
            )));
        }
        settings.font_family = font_family;
    }

    if let Some(auto_cleanup) = update.auto_cleanup {
        settings.auto_cleanup = auto_cleanup;
    }
    if let Some(allow) = update.allow_viewer_messages {
        settings.allow_viewer_messages = allow;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryRoomStore;
    use crate::state::{Timer, TimerType};

    fn service() -> RoomService {
        RoomService::new(Arc::new(MemoryRoomStore::new()), Duration::from_secs(3600), 10)
    }

    #[tokio::test]
    async fn settings_validation() {
        let rooms = service();
        let room = rooms.create_room().await.unwrap();

        let err = rooms
            .update_settings(
                &room.id,
                RoomSettingsUpdate {
                    font_family: Some("comic-sans".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "VALIDATION_ERROR");

        let updated = rooms
            .update_settings(
                &room.id,
                RoomSettingsUpdate {
                    max_timers: Some(3),
                    primary_color: Some("#FF0000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.settings.max_timers, 3);
        assert_eq!(updated.settings.primary_color, "#FF0000");
        assert_eq!(updated.settings.font_family, "sans-serif");
    }

    #[tokio::test]
    async fn max_timers_cannot_drop_below_current_count() {
        let rooms = service();
        let (guard, mut room) = {
            let room = rooms.create_room().await.unwrap();
            rooms.lock_room(&room.id).await.unwrap()
        };
        room.add_timer(Timer::new("A", 1_000, TimerType::Countdown)).unwrap();
        room.add_timer(Timer::new("B", 1_000, TimerType::Countdown)).unwrap();
        rooms.save_room(&mut room).await.unwrap();
        drop(guard);

        let result = rooms
            .update_settings(
                &room.id,
                RoomSettingsUpdate {
                    max_timers: Some(1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn malformed_ids_are_absent() {
        let rooms = service();
        assert!(rooms.get_room("nope").await.unwrap().is_none());
        assert!(matches!(
            rooms.lock_room("nope").await,
            Err(Error::RoomNotFound(_))
        ));
        assert_eq!(rooms.tracked_locks(), 0);
    }
}
