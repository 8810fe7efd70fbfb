//! Room lifecycle events
//!
//! Every state transition is described by one [`RoomEvent`] variant carrying
//! its own payload. Events are wrapped in an [`EventEnvelope`] addressed to a
//! room and handed to an [`EventSink`] by the [`EventPublisher`].

pub mod publisher;
pub mod sink;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::{
    Message, MessagePriority, Room, RoomSettings, RoomStats, Timer, TimerSettings, TimerState,
    TimerType,
};

pub use publisher::{EventPublisher, TickRateLimiter};
pub use sink::{BroadcastSink, EventSink};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomEvent {
    TimerCreated(TimerSnapshot),
    TimerUpdated(TimerSnapshot),
    TimerDeleted(TimerRemoved),
    TimerStarted(TimerControl),
    TimerPaused(TimerControl),
    TimerStopped(TimerControl),
    TimerReset(TimerControl),
    TimerAdjusted(TimerControl),
    TimerTick(TimerTick),
    TimerWarning(TimerAlert),
    TimerCritical(TimerAlert),
    TimerCompleted(TimerCompleted),
    MessageCreated(MessageSnapshot),
    MessageUpdated(MessageSnapshot),
    MessageDeleted(MessageRemoved),
    MessageShown(MessageVisibility),
    MessageHidden(MessageVisibility),
    RoomJoined(RoomSync),
    UserJoined(RoomStats),
    UserLeft(RoomStats),
    RoomUpdated(RoomSettings),
    RoomDeleted(RoomRemoved),
}

impl RoomEvent {
    /// Wire tag of the event
    pub fn kind(&self) -> &'static str {
        match self {
            RoomEvent::TimerCreated(_) => "TIMER_CREATED",
            RoomEvent::TimerUpdated(_) => "TIMER_UPDATED",
            RoomEvent::TimerDeleted(_) => "TIMER_DELETED",
            RoomEvent::TimerStarted(_) => "TIMER_STARTED",
            RoomEvent::TimerPaused(_) => "TIMER_PAUSED",
            RoomEvent::TimerStopped(_) => "TIMER_STOPPED",
            RoomEvent::TimerReset(_) => "TIMER_RESET",
            RoomEvent::TimerAdjusted(_) => "TIMER_ADJUSTED",
            RoomEvent::TimerTick(_) => "TIMER_TICK",
            RoomEvent::TimerWarning(_) => "TIMER_WARNING",
            RoomEvent::TimerCritical(_) => "TIMER_CRITICAL",
            RoomEvent::TimerCompleted(_) => "TIMER_COMPLETED",
            RoomEvent::MessageCreated(_) => "MESSAGE_CREATED",
            RoomEvent::MessageUpdated(_) => "MESSAGE_UPDATED",
            RoomEvent::MessageDeleted(_) => "MESSAGE_DELETED",
            RoomEvent::MessageShown(_) => "MESSAGE_SHOWN",
            RoomEvent::MessageHidden(_) => "MESSAGE_HIDDEN",
            RoomEvent::RoomJoined(_) => "ROOM_JOINED",
            RoomEvent::UserJoined(_) => "USER_JOINED",
            RoomEvent::UserLeft(_) => "USER_LEFT",
            RoomEvent::RoomUpdated(_) => "ROOM_UPDATED",
            RoomEvent::RoomDeleted(_) => "ROOM_DELETED",
        }
    }

    /// Tick events are the only rate-limited kind
    pub fn is_tick(&self) -> bool {
        matches!(self, RoomEvent::TimerTick(_))
    }

    /// Timer the event refers to, if any
    pub fn timer_id(&self) -> Option<&str> {
        match self {
            RoomEvent::TimerCreated(t) | RoomEvent::TimerUpdated(t) => Some(t.id.as_str()),
            RoomEvent::TimerDeleted(t) => Some(t.id.as_str()),
            RoomEvent::TimerStarted(c)
            | RoomEvent::TimerPaused(c)
            | RoomEvent::TimerStopped(c)
            | RoomEvent::TimerReset(c)
            | RoomEvent::TimerAdjusted(c) => Some(c.id.as_str()),
            RoomEvent::TimerTick(t) => Some(t.id.as_str()),
            RoomEvent::TimerWarning(a) | RoomEvent::TimerCritical(a) => Some(a.id.as_str()),
            RoomEvent::TimerCompleted(c) => Some(c.id.as_str()),
            _ => None,
        }
    }

    pub fn timer_created(timer: &Timer) -> Self {
        RoomEvent::TimerCreated(TimerSnapshot::from(timer))
    }

    pub fn timer_updated(timer: &Timer) -> Self {
        RoomEvent::TimerUpdated(TimerSnapshot::from(timer))
    }

    pub fn timer_deleted(timer: &Timer) -> Self {
        RoomEvent::TimerDeleted(TimerRemoved {
            id: timer.id().to_string(),
            name: timer.name().to_string(),
        })
    }

    pub fn timer_started(timer: &Timer) -> Self {
        RoomEvent::TimerStarted(TimerControl::new(timer, timer.started_at()))
    }

    pub fn timer_paused(timer: &Timer) -> Self {
        RoomEvent::TimerPaused(TimerControl::new(timer, timer.paused_at()))
    }

    pub fn timer_stopped(timer: &Timer) -> Self {
        RoomEvent::TimerStopped(TimerControl::new(timer, None))
    }

    pub fn timer_reset(timer: &Timer) -> Self {
        RoomEvent::TimerReset(TimerControl::new(timer, None))
    }

    pub fn timer_adjusted(timer: &Timer) -> Self {
        RoomEvent::TimerAdjusted(TimerControl::new(timer, timer.started_at()))
    }

    pub fn timer_tick(timer: &Timer) -> Self {
        RoomEvent::TimerTick(TimerTick {
            id: timer.id().to_string(),
            current_time: timer.current_time(),
            state: timer.state(),
        })
    }

    pub fn timer_warning(timer: &Timer) -> Self {
        RoomEvent::TimerWarning(TimerAlert {
            id: timer.id().to_string(),
            level: AlertLevel::Warning,
            current_time: timer.current_time(),
            threshold: timer.settings().warning_time,
            message: "Timer entering warning state".to_string(),
        })
    }

    pub fn timer_critical(timer: &Timer) -> Self {
        RoomEvent::TimerCritical(TimerAlert {
            id: timer.id().to_string(),
            level: AlertLevel::Critical,
            current_time: timer.current_time(),
            threshold: timer.settings().critical_time,
            message: "Timer entering critical state".to_string(),
        })
    }

    pub fn timer_completed(timer: &Timer) -> Self {
        RoomEvent::TimerCompleted(TimerCompleted {
            id: timer.id().to_string(),
            name: timer.name().to_string(),
            completed_at: timer.completed_at(),
            play_sound: timer.settings().play_sound,
            auto_reset: timer.settings().auto_reset,
        })
    }

    pub fn message_created(message: &Message) -> Self {
        RoomEvent::MessageCreated(MessageSnapshot::from(message))
    }

    pub fn message_updated(message: &Message) -> Self {
        RoomEvent::MessageUpdated(MessageSnapshot::from(message))
    }

    pub fn message_deleted(message: &Message) -> Self {
        RoomEvent::MessageDeleted(MessageRemoved {
            id: message.id.clone(),
            text: message.text.clone(),
        })
    }

    pub fn message_visibility(message_id: &str, visible: bool) -> Self {
        let payload = MessageVisibility {
            id: message_id.to_string(),
            visible,
        };
        if visible {
            RoomEvent::MessageShown(payload)
        } else {
            RoomEvent::MessageHidden(payload)
        }
    }
}

/// Full timer state, sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub id: String,
    pub name: String,
    pub duration: u64,
    pub current_time: u64,
    pub state: TimerState,
    #[serde(rename = "type")]
    pub timer_type: TimerType,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub settings: TimerSettings,
}

impl From<&Timer> for TimerSnapshot {
    fn from(timer: &Timer) -> Self {
        Self {
            id: timer.id().to_string(),
            name: timer.name().to_string(),
            duration: timer.duration(),
            current_time: timer.current_time(),
            state: timer.state(),
            timer_type: timer.timer_type(),
            created_at: timer.created_at(),
            started_at: timer.started_at(),
            settings: timer.settings().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerRemoved {
    pub id: String,
    pub name: String,
}

/// Lightweight payload for start/pause/stop/reset/adjust
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerControl {
    pub id: String,
    pub state: TimerState,
    pub current_time: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TimerControl {
    fn new(timer: &Timer, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            id: timer.id().to_string(),
            state: timer.state(),
            current_time: timer.current_time(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerTick {
    pub id: String,
    pub current_time: u64,
    pub state: TimerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerAlert {
    pub id: String,
    pub level: AlertLevel,
    pub current_time: u64,
    pub threshold: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerCompleted {
    pub id: String,
    pub name: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub play_sound: bool,
    pub auto_reset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    pub id: String,
    pub text: String,
    pub visible: bool,
    pub priority: MessagePriority,
    pub color: String,
    pub timestamp: DateTime<Utc>,
    pub auto_hide_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            text: message.text.clone(),
            visible: message.visible,
            priority: message.priority,
            color: message.color.clone(),
            timestamp: message.timestamp,
            auto_hide_at: message.auto_hide_at,
            created_by: message.created_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRemoved {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageVisibility {
    pub id: String,
    pub visible: bool,
}

/// Initial state handed to a newly subscribed connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSync {
    pub room: Room,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomRemoved {
    pub id: String,
}

/// An event addressed to a room, as delivered to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub room_id: String,
    #[serde(flatten)]
    pub event: RoomEvent,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(room_id: impl Into<String>, event: RoomEvent) -> Self {
        Self {
            room_id: room_id.into(),
            event,
            timestamp: Utc::now(),
        }
    }
}
