//! State management module
//!
//! Timer, room and message entities plus the shared application state.

pub mod app_state;
pub mod message;
pub mod room;
pub mod timer;

// Re-export main types
pub use app_state::{AppState, RoomSubscription};
pub use message::{
    is_hex_color, is_valid_color, Message, MessagePriority, MAX_TEXT_CHARS, MIN_DISPLAY_DURATION,
};
pub use room::{Room, RoomSettings, RoomStats, RoomStatus, FONT_FAMILIES, MAX_TIMERS_LIMIT};
pub use timer::{
    AlertBand, Timer, TimerAction, TimerSettings, TimerState, TimerType, TransitionError,
    MAX_NAME_CHARS, TICK_MILLIS,
};
