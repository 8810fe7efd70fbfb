//! Message commands and lazy auto-hide

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{Error, Result},
    events::{EventPublisher, RoomEvent},
    state::{
        is_valid_color, Message, MessagePriority, Room, MAX_TEXT_CHARS, MIN_DISPLAY_DURATION,
    },
};

use super::RoomService;

fn default_color() -> String {
    "blue".to_string()
}

fn default_auto_show() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    pub text: String,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_auto_show")]
    pub auto_show: bool,
    /// Display duration in milliseconds
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl CreateMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            priority: MessagePriority::default(),
            color: default_color(),
            auto_show: true,
            duration: None,
            created_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessage {
    pub text: Option<String>,
    pub visible: Option<bool>,
    pub priority: Option<MessagePriority>,
    pub color: Option<String>,
}

pub struct MessageService {
    rooms: Arc<RoomService>,
    events: Arc<EventPublisher>,
}

impl MessageService {
    pub fn new(rooms: Arc<RoomService>, events: Arc<EventPublisher>) -> Self {
        Self { rooms, events }
    }

    pub async fn create_message(&self, room_id: &str, request: CreateMessage) -> Result<Message> {
        validate_text(&request.text)?;
        validate_color(&request.color)?;
        if let Some(duration) = request.duration {
            if duration < MIN_DISPLAY_DURATION {
                return Err(Error::InvalidArgument(format!(
                    "display duration must be at least {}ms",
                    MIN_DISPLAY_DURATION
                )));
            }
        }

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let mut message = Message::new(request.text, request.priority, request.color);
        message.auto_show = request.auto_show;
        message.visible = request.auto_show;
        message.created_by = request.created_by;
        if let Some(duration) = request.duration {
            message.set_display_duration(duration);
        }

        room.add_message(message.clone());
        self.rooms.save_room(&mut room).await?;

        info!("Created message {} in room {}", message.id, room_id);
        self.events.publish(room_id, RoomEvent::message_created(&message));
        Ok(message)
    }

    pub async fn update_message(&self, room_id: &str, message_id: &str, update: UpdateMessage) -> Result<Message> {
        if let Some(text) = &update.text {
            validate_text(text)?;
        }
        if let Some(color) = &update.color {
            validate_color(color)?;
        }

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let message = find_message(&mut room, room_id, message_id)?;
        if let Some(text) = update.text {
            message.set_text(text);
        }
        if let Some(visible) = update.visible {
            message.set_visible(visible);
        }
        if let Some(priority) = update.priority {
            message.set_priority(priority);
        }
        if let Some(color) = update.color {
            message.set_color(color);
        }

        let message = message.clone();
        self.rooms.save_room(&mut room).await?;

        info!("Updated message {} in room {}", message_id, room_id);
        self.events.publish(room_id, RoomEvent::message_updated(&message));
        Ok(message)
    }

    pub async fn delete_message(&self, room_id: &str, message_id: &str) -> Result<()> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let message = room
            .remove_message(message_id)
            .ok_or_else(|| Error::MessageNotFound {
                room_id: room_id.to_string(),
                message_id: message_id.to_string(),
            })?;
        self.rooms.save_room(&mut room).await?;

        info!("Deleted message {} from room {}", message_id, room_id);
        self.events.publish(room_id, RoomEvent::message_deleted(&message));
        Ok(())
    }

    pub async fn show_message(&self, room_id: &str, message_id: &str) -> Result<Message> {
        self.set_visibility(room_id, message_id, true).await
    }

    pub async fn hide_message(&self, room_id: &str, message_id: &str) -> Result<Message> {
        self.set_visibility(room_id, message_id, false).await
    }

    async fn set_visibility(&self, room_id: &str, message_id: &str, visible: bool) -> Result<Message> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let message = find_message(&mut room, room_id, message_id)?;
        message.set_visible(visible);

        let message = message.clone();
        self.rooms.save_room(&mut room).await?;

        info!(
            "{} message {} in room {}",
            if visible { "Showed" } else { "Hid" },
            message_id,
            room_id
        );
        self.events
            .publish(room_id, RoomEvent::message_visibility(message_id, visible));
        Ok(message)
    }

    /// Hide messages past their auto-hide deadline; saves only if any changed
    pub async fn check_and_hide_expired(&self, room_id: &str) -> Result<Vec<String>> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let hidden = room.hide_expired_messages(Utc::now());
        if hidden.is_empty() {
            return Ok(hidden);
        }

        self.rooms.save_room(&mut room).await?;
        info!("Auto-hid {} messages in room {}", hidden.len(), room_id);
        self.events.publish_all(
            room_id,
            hidden
                .iter()
                .map(|id| RoomEvent::message_visibility(id, false)),
        );
        Ok(hidden)
    }
}

fn find_message<'a>(room: &'a mut Room, room_id: &str, message_id: &str) -> Result<&'a mut Message> {
    room.message_mut(message_id)
        .ok_or_else(|| Error::MessageNotFound {
            room_id: room_id.to_string(),
            message_id: message_id.to_string(),
        })
}

fn validate_text(text: &str) -> Result<()> {
    let length = text.trim().chars().count();
    if length == 0 || text.chars().count() > MAX_TEXT_CHARS {
        return Err(Error::InvalidArgument(format!(
            "message text must be between 1 and {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(())
}

fn validate_color(color: &str) -> Result<()> {
    if !is_valid_color(color) {
        return Err(Error::InvalidArgument(
            "color must be a valid hex color or predefined color name".to_string(),
        ));
    }
    Ok(())
}
