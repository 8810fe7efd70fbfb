//! On-screen messages shown alongside a room's timers

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted message text, in characters
pub const MAX_TEXT_CHARS: usize = 500;

/// Shortest display duration that arms auto-hide, in milliseconds
pub const MIN_DISPLAY_DURATION: u64 = 1_000;

const NAMED_COLORS: [&str; 10] = [
    "red", "green", "blue", "yellow", "orange", "purple", "pink", "gray", "black", "white",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub visible: bool,
    pub timestamp: DateTime<Utc>,
    pub priority: MessagePriority,
    pub color: String,
    pub auto_hide_at: Option<DateTime<Utc>>,
    /// Milliseconds the message stays visible before auto-hide
    pub display_duration: Option<u64>,
    pub auto_show: bool,
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(text: impl Into<String>, priority: MessagePriority, color: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            visible: true,
            timestamp: now,
            priority,
            color: color.into(),
            auto_hide_at: None,
            display_duration: None,
            auto_show: true,
            created_by: None,
            updated_at: now,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.updated_at = Utc::now();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.updated_at = Utc::now();
    }

    pub fn set_priority(&mut self, priority: MessagePriority) {
        self.priority = priority;
        self.updated_at = Utc::now();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
        self.updated_at = Utc::now();
    }

    /// Arm auto-hide `duration` milliseconds from now
    pub fn set_display_duration(&mut self, duration: u64) {
        self.display_duration = Some(duration);
        if duration > 0 {
            let millis = i64::try_from(duration).unwrap_or(i64::MAX);
            self.auto_hide_at = Utc::now().checked_add_signed(Duration::milliseconds(millis));
        }
    }

    pub fn show(&mut self) {
        self.set_visible(true);
    }

    pub fn hide(&mut self) {
        self.set_visible(false);
    }

    pub fn should_auto_hide(&self) -> bool {
        self.should_auto_hide_at(Utc::now())
    }

    pub fn should_auto_hide_at(&self, now: DateTime<Utc>) -> bool {
        self.visible && self.auto_hide_at.is_some_and(|hide_at| now > hide_at)
    }

    pub fn is_high_priority(&self) -> bool {
        matches!(self.priority, MessagePriority::High | MessagePriority::Critical)
    }

    pub fn is_critical_priority(&self) -> bool {
        self.priority == MessagePriority::Critical
    }

    /// Time left before auto-hide, `None` if auto-hide is not armed
    pub fn time_until_auto_hide(&self) -> Option<Duration> {
        self.auto_hide_at.map(|hide_at| hide_at - Utc::now())
    }
}

/// Accepts `#RRGGBB` or one of the predefined color names
pub fn is_valid_color(color: &str) -> bool {
    NAMED_COLORS.contains(&color) || is_hex_color(color)
}

/// Accepts `#RRGGBB` only
pub fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_hide_only_after_deadline_and_while_visible() {
        let mut message = Message::new("Five minutes left", MessagePriority::High, "red");
        assert!(!message.should_auto_hide());
        assert!(message.time_until_auto_hide().is_none());

        message.set_display_duration(5_000);
        let hide_at = message.auto_hide_at.unwrap();
        assert!(!message.should_auto_hide_at(hide_at));
        assert!(message.should_auto_hide_at(hide_at + Duration::milliseconds(1)));

        message.hide();
        assert!(!message.should_auto_hide_at(hide_at + Duration::seconds(1)));
    }

    #[test]
    fn priority_queries() {
        let message = Message::new("Wrap up", MessagePriority::Critical, "blue");
        assert!(message.is_high_priority());
        assert!(message.is_critical_priority());

        let message = Message::new("Welcome", MessagePriority::Low, "blue");
        assert!(!message.is_high_priority());
    }

    #[test]
    fn color_validation() {
        assert!(is_valid_color("#3B82F6"));
        assert!(is_valid_color("purple"));
        assert!(!is_valid_color("#3B82F"));
        assert!(!is_valid_color("#GGGGGG"));
        assert!(!is_valid_color("teal"));
    }
}
