//! Main application state management

use std::{sync::Arc, time::Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceSettings,
    error::{Error, Result},
    events::{BroadcastSink, EventEnvelope, EventPublisher, RoomEvent, RoomRemoved, RoomSync},
    services::{
        MemoryRoomStore, MessageService, PresenceTracker, RoomService, RoomSettingsUpdate,
        RoomStore, TimerCoordinator, UserRole,
    },
};

use super::{Room, RoomStats, RoomStatus};

/// Streams handed to a newly joined connection
#[derive(Debug)]
pub struct RoomSubscription {
    pub connection_id: String,
    pub room_id: String,
    /// Events addressed to this connection only
    pub direct: mpsc::UnboundedReceiver<EventEnvelope>,
    /// Events broadcast to the whole room
    pub room_events: broadcast::Receiver<EventEnvelope>,
}

/// Shared state: services wired to one store and one event sink
pub struct AppState {
    pub rooms: Arc<RoomService>,
    pub timers: TimerCoordinator,
    pub messages: MessageService,
    pub presence: PresenceTracker,
    pub events: Arc<EventPublisher>,
    pub sink: Arc<BroadcastSink>,
    /// Server metadata
    pub start_time: Instant,
}

impl AppState {
    /// Create state backed by the in-memory room store
    pub fn new(settings: ServiceSettings) -> Self {
        Self::with_store(settings, Arc::new(MemoryRoomStore::new()))
    }

    pub fn with_store(settings: ServiceSettings, store: Arc<dyn RoomStore>) -> Self {
        Self::with_room_service(
            RoomService::new(store, settings.room_ttl, settings.default_max_timers),
            settings.tick_rate_limit,
        )
    }

    /// Build around a preconfigured room service
    pub fn with_room_service(rooms: RoomService, tick_rate_limit: u32) -> Self {
        let rooms = Arc::new(rooms);
        let sink = Arc::new(BroadcastSink::new());
        let events = Arc::new(EventPublisher::new(sink.clone(), tick_rate_limit));

        Self {
            timers: TimerCoordinator::new(Arc::clone(&rooms), Arc::clone(&events)),
            messages: MessageService::new(Arc::clone(&rooms), Arc::clone(&events)),
            presence: PresenceTracker::new(),
            rooms,
            events,
            sink,
            start_time: Instant::now(),
        }
    }

    pub async fn create_room(&self) -> Result<Room> {
        self.rooms.create_room().await
    }

    /// Fetch a room for use: auto-hide due messages, then keep it alive
    pub async fn open_room(&self, room_id: &str) -> Result<Room> {
        self.messages.check_and_hide_expired(room_id).await?;
        self.rooms.touch_room(room_id).await
    }

    pub async fn room_status(&self, room_id: &str) -> Result<RoomStatus> {
        let status = match self.rooms.get_room(room_id).await? {
            Some(room) => RoomStatus {
                exists: true,
                active: !room.is_expired(),
                connected_users: self.presence.counts(room_id).connected_users,
                last_activity: Some(room.last_activity),
            },
            None => RoomStatus::absent(),
        };
        Ok(status)
    }

    pub async fn update_room_settings(&self, room_id: &str, update: RoomSettingsUpdate) -> Result<Room> {
        let room = self.rooms.update_settings(room_id, update).await?;
        self.events
            .publish(room_id, RoomEvent::RoomUpdated(room.settings.clone()));
        Ok(room)
    }

    /// Stop all timers, delete the room and notify its subscribers
    pub async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.timers.stop_all_timers(room_id).await?;

        let (guard, _room) = self.rooms.lock_room(room_id).await?;
        self.rooms.delete_room(room_id).await?;
        self.timers.cancel_room_schedules(room_id);
        self.events.publish(
            room_id,
            RoomEvent::RoomDeleted(RoomRemoved {
                id: room_id.to_string(),
            }),
        );
        drop(guard);

        self.teardown_room(room_id);
        Ok(())
    }

    /// Subscribe a new connection to a room
    ///
    /// The connection receives the full room state on its direct channel and
    /// everyone in the room is told about the new counts.
    pub async fn join_room(
        &self,
        room_id: &str,
        role: UserRole,
        client_info: Option<String>,
    ) -> Result<RoomSubscription> {
        // Fails with RoomNotFound for absent rooms
        self.messages.check_and_hide_expired(room_id).await?;

        let connection_id = Uuid::new_v4().to_string();
        let direct = self.sink.register_connection(&connection_id);
        let room_events = self.sink.subscribe_room(room_id);
        let stats = self
            .presence
            .subscribe(room_id, &connection_id, role, client_info);

        let room = match self.rooms.update_stats(room_id, stats).await {
            Ok(room) => room,
            Err(e) => {
                self.presence.unsubscribe(&connection_id);
                self.sink.remove_connection(&connection_id);
                return Err(e);
            }
        };

        info!(
            "Connection {} joined room {} as {:?}",
            connection_id, room_id, role
        );
        self.events.send_to(
            room_id,
            &connection_id,
            RoomEvent::RoomJoined(RoomSync {
                room,
                client_id: connection_id.clone(),
            }),
        );
        self.events.publish(room_id, RoomEvent::UserJoined(stats));

        Ok(RoomSubscription {
            connection_id,
            room_id: room_id.to_string(),
            direct,
            room_events,
        })
    }

    /// Drop a connection; returns the room's new counts if it was subscribed
    pub async fn leave_room(&self, connection_id: &str) -> Result<Option<RoomStats>> {
        self.sink.remove_connection(connection_id);
        let Some((room_id, stats)) = self.presence.unsubscribe(connection_id) else {
            return Ok(None);
        };

        match self.rooms.update_stats(&room_id, stats).await {
            Ok(_) | Err(Error::RoomNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        info!("Connection {} left room {}", connection_id, room_id);
        self.events.publish(&room_id, RoomEvent::UserLeft(stats));
        Ok(Some(stats))
    }

    /// Sweep expired rooms and release everything tied to them
    pub async fn cleanup_expired_rooms(&self) -> Result<usize> {
        let removed = self.rooms.cleanup_expired_rooms().await?;
        for room_id in &removed {
            let cancelled = self.timers.cancel_room_schedules(room_id);
            if cancelled > 0 {
                warn!("Cancelled {} tickers of expired room {}", cancelled, room_id);
            }
            self.teardown_room(room_id);
        }
        Ok(removed.len())
    }

    /// Stop every ticker; used on shutdown
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    fn teardown_room(&self, room_id: &str) {
        self.events.forget_room(room_id);
        for connection_id in self.presence.clear_room(room_id) {
            self.sink.remove_connection(&connection_id);
        }
        self.sink.close_room(room_id);
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
