//! Services module
//!
//! Room persistence, timer coordination, messages and presence.

pub mod coordinator;
pub mod messages;
pub mod presence;
pub mod room_ids;
pub mod rooms;
pub mod store;

// Re-export main types
pub use coordinator::{CreateTimer, TickOutcome, TimerCoordinator, UpdateTimer};
pub use messages::{CreateMessage, MessageService, UpdateMessage};
pub use presence::{ConnectionInfo, PresenceTracker, UserRole};
pub use room_ids::{generate_room_id, is_valid_room_id};
pub use rooms::{RoomService, RoomSettingsUpdate, ROOM_ID_ATTEMPTS};
pub use store::{MemoryRoomStore, RoomStore};
