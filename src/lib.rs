//! Room Timers - shared countdown and stopwatch timers coordinated across rooms
//!
//! Rooms hold timers and messages. Control commands and once-per-second ticks
//! mutate a room under its lock, persist it through the room store and
//! broadcast lifecycle events to every subscriber of the room.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, ServiceSettings};
pub use error::{Error, Result};
pub use state::AppState;
pub use utils::signals::shutdown_signal;
