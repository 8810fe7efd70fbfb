#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use room_timers::{
    error::StoreError,
    events::{EventEnvelope, RoomEvent},
    services::{MemoryRoomStore, RoomStore},
    state::{AppState, Room, Timer},
    ServiceSettings,
};
use tokio::sync::broadcast::{self, error::TryRecvError};

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        room_ttl: Duration::from_secs(3600),
        default_max_timers: 10,
        tick_rate_limit: 10,
    }
}

pub fn state() -> AppState {
    AppState::new(settings())
}

/// Everything broadcast since the last drain
pub fn drain(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<RoomEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(envelope) => events.push(envelope.event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}

pub fn kinds(events: &[RoomEvent]) -> Vec<&'static str> {
    events.iter().map(RoomEvent::kind).collect()
}

pub fn count(events: &[RoomEvent], kind: &str) -> usize {
    events.iter().filter(|event| event.kind() == kind).count()
}

pub async fn timer(state: &AppState, room_id: &str, timer_id: &str) -> Timer {
    state
        .rooms
        .get_room(room_id)
        .await
        .unwrap()
        .expect("room exists")
        .timer(timer_id)
        .expect("timer exists")
        .clone()
}

pub async fn sleep_ms(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

/// Memory store whose reads or writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRoomStore,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_loads(&self, failing: bool) {
        self.fail_loads.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoomStore for FlakyStore {
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read refused".to_string()));
        }
        self.inner.load(room_id).await
    }

    async fn save(&self, room: &Room, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".to_string()));
        }
        self.inner.save(room, ttl).await
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        self.inner.delete(room_id).await
    }

    async fn evict(&self, room_id: &str) -> Result<(), StoreError> {
        self.inner.evict(room_id).await
    }

    async fn list_active_room_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.inner.list_active_room_ids().await
    }

    async fn deactivate(&self, room_id: &str) -> Result<(), StoreError> {
        self.inner.deactivate(room_id).await
    }
}

pub fn flaky_state() -> (AppState, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let state = AppState::with_store(settings(), store.clone());
    (state, store)
}
