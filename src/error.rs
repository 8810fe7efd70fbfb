//! Error types surfaced by the room, timer and message services

use thiserror::Error;

use crate::state::{TimerAction, TimerState};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the room store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode or decode room: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("room store unavailable: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("room {0} not found or expired")]
    RoomNotFound(String),

    #[error("timer {timer_id} not found in room {room_id}")]
    TimerNotFound { room_id: String, timer_id: String },

    #[error("message {message_id} not found in room {room_id}")]
    MessageNotFound { room_id: String, message_id: String },

    #[error("room {room_id} already holds the maximum of {max_timers} timers")]
    CapacityExceeded { room_id: String, max_timers: u32 },

    #[error("cannot {action} timer {timer_id} while it is {state}")]
    InvalidStateTransition {
        timer_id: String,
        state: TimerState,
        action: TimerAction,
    },

    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to generate a unique room id after {attempts} attempts")]
    RoomIdGeneration { attempts: usize },
}

impl Error {
    /// Machine-readable reason code reported to command callers
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Error::TimerNotFound { .. } => "TIMER_NOT_FOUND",
            Error::MessageNotFound { .. } => "MESSAGE_NOT_FOUND",
            Error::CapacityExceeded { .. } => "TIMER_LIMIT_EXCEEDED",
            Error::InvalidStateTransition { .. } => "INVALID_TIMER_STATE",
            Error::MissingArgument(_) => "MISSING_ARGUMENT",
            Error::InvalidArgument(_) => "VALIDATION_ERROR",
            Error::Store(_) | Error::RoomIdGeneration { .. } => "INTERNAL_ERROR",
        }
    }

    /// Internal failures are reported to callers without detail
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Store(_) | Error::RoomIdGeneration { .. })
    }
}
