//! Room aggregate: a TTL-bounded namespace owning timers and messages

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{Message, Timer};

/// Upper bound for `RoomSettings::max_timers`
pub const MAX_TIMERS_LIMIT: u32 = 50;

pub const FONT_FAMILIES: [&str; 5] = ["sans-serif", "serif", "monospace", "cursive", "fantasy"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    pub max_timers: u32,
    pub auto_cleanup: bool,
    pub allow_viewer_messages: bool,
    pub primary_color: String,
    pub background_color: String,
    pub font_family: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_timers: 10,
            auto_cleanup: true,
            allow_viewer_messages: false,
            primary_color: "#3B82F6".to_string(),
            background_color: "#000000".to_string(),
            font_family: "sans-serif".to_string(),
        }
    }
}

/// Presence counts mirrored into the room; not authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomStats {
    pub connected_users: u32,
    pub total_controllers: u32,
    pub total_viewers: u32,
}

/// Liveness summary of a room, reported even when the room is absent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub exists: bool,
    pub active: bool,
    pub connected_users: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl RoomStatus {
    pub fn absent() -> Self {
        Self {
            exists: false,
            active: false,
            connected_users: 0,
            last_activity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub created: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    timers: Vec<Timer>,
    messages: Vec<Message>,
    pub settings: RoomSettings,
    pub stats: RoomStats,
}

impl Room {
    /// Create an empty room expiring `ttl` from now
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            last_activity: now,
            expires_at: now + ttl,
            timers: Vec::new(),
            messages: Vec::new(),
            settings: RoomSettings::default(),
            stats: RoomStats::default(),
        }
    }

    /// Refresh last activity without touching the expiry window
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Refresh last activity and push the expiry `ttl` into the future
    pub fn refresh_expiry(&mut self, ttl: Duration) {
        self.touch();
        self.expires_at = self.last_activity + ttl;
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> impl Iterator<Item = &mut Timer> {
        self.timers.iter_mut()
    }

    pub fn can_add_timer(&self) -> bool {
        self.timers.len() < self.settings.max_timers as usize
    }

    /// Append a timer; refused once the room is at `max_timers`
    pub fn add_timer(&mut self, timer: Timer) -> Result<()> {
        if !self.can_add_timer() {
            return Err(Error::CapacityExceeded {
                room_id: self.id.clone(),
                max_timers: self.settings.max_timers,
            });
        }

        self.timers.push(timer);
        self.touch();
        Ok(())
    }

    /// Remove a timer by id; absent ids are ignored
    pub fn remove_timer(&mut self, timer_id: &str) -> Option<Timer> {
        let index = self.timers.iter().position(|t| t.id() == timer_id);
        self.touch();
        index.map(|i| self.timers.remove(i))
    }

    pub fn timer(&self, timer_id: &str) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id() == timer_id)
    }

    pub fn timer_mut(&mut self, timer_id: &str) -> Option<&mut Timer> {
        self.timers.iter_mut().find(|t| t.id() == timer_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    pub fn remove_message(&mut self, message_id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == message_id);
        self.touch();
        index.map(|i| self.messages.remove(i))
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Hide every visible message past its auto-hide deadline, returning their ids
    pub fn hide_expired_messages(&mut self, now: DateTime<Utc>) -> Vec<String> {
        self.messages
            .iter_mut()
            .filter(|m| m.should_auto_hide_at(now))
            .map(|m| {
                m.hide();
                m.id.clone()
            })
            .collect()
    }
}
