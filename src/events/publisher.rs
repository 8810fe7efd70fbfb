//! Envelope shaping and tick rate limiting in front of the event sink

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::time::Instant;
use tracing::debug;

use super::{EventEnvelope, EventSink, RoomEvent};

const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Fixed one-second window counter per room
#[derive(Debug)]
pub struct TickRateLimiter {
    max_per_window: u32,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl TickRateLimiter {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_window: max_per_second.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Whether one more tick event may go out for `room_id` right now
    pub fn allow(&self, room_id: &str) -> bool {
        self.allow_at(room_id, Instant::now())
    }

    pub fn allow_at(&self, room_id: &str, now: Instant) -> bool {
        let Ok(mut windows) = self.windows.lock() else {
            return true;
        };

        let (started, count) = windows.entry(room_id.to_string()).or_insert((now, 0));
        if now.duration_since(*started) >= RATE_WINDOW {
            *started = now;
            *count = 0;
        }

        if *count < self.max_per_window {
            *count += 1;
            true
        } else {
            false
        }
    }

    pub fn forget(&self, room_id: &str) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.remove(room_id);
        }
    }
}

/// Publishes room events through the sink; tick events pass the rate limiter first
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
    limiter: TickRateLimiter,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>, tick_rate_limit: u32) -> Self {
        Self {
            sink,
            limiter: TickRateLimiter::new(tick_rate_limit),
        }
    }

    /// Broadcast to the room; returns false if a tick was dropped by the limiter
    pub fn publish(&self, room_id: &str, event: RoomEvent) -> bool {
        if event.is_tick() && !self.limiter.allow(room_id) {
            debug!("Rate limit reached for room {}, dropping tick", room_id);
            return false;
        }

        debug!("Publishing {} to room {}", event.kind(), room_id);
        self.sink.broadcast(EventEnvelope::new(room_id, event));
        true
    }

    /// Publish a batch in order
    pub fn publish_all(&self, room_id: &str, events: impl IntoIterator<Item = RoomEvent>) {
        for event in events {
            self.publish(room_id, event);
        }
    }

    /// Deliver to one connection only, bypassing the limiter
    pub fn send_to(&self, room_id: &str, connection_id: &str, event: RoomEvent) -> bool {
        debug!("Sending {} to connection {}", event.kind(), connection_id);
        self.sink
            .send_to(connection_id, EventEnvelope::new(room_id, event))
    }

    pub fn forget_room(&self, room_id: &str) {
        self.limiter.forget(room_id);
    }
}
