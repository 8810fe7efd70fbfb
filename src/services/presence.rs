//! Which connections are subscribed to which rooms, and in what role

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::RoomStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Controller,
    #[default]
    Viewer,
}

impl UserRole {
    /// Parse a role as sent by clients; anything unknown is a viewer
    pub fn parse(role: Option<&str>) -> Self {
        match role {
            Some(role) if role.eq_ignore_ascii_case("controller") => UserRole::Controller,
            _ => UserRole::Viewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub room_id: String,
    pub role: UserRole,
    pub client_info: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    connections: Mutex<HashMap<String, ConnectionInfo>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection in a room, replacing any previous subscription
    pub fn subscribe(
        &self,
        room_id: &str,
        connection_id: &str,
        role: UserRole,
        client_info: Option<String>,
    ) -> RoomStats {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        connections.insert(
            connection_id.to_string(),
            ConnectionInfo {
                connection_id: connection_id.to_string(),
                room_id: room_id.to_string(),
                role,
                client_info,
                connected_at: Utc::now(),
            },
        );
        count(&connections, room_id)
    }

    /// Drop a connection, returning the room it was in with updated counts
    pub fn unsubscribe(&self, connection_id: &str) -> Option<(String, RoomStats)> {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        let info = connections.remove(connection_id)?;
        let stats = count(&connections, &info.room_id);
        Some((info.room_id, stats))
    }

    pub fn connection(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.connections
            .lock()
            .ok()
            .and_then(|connections| connections.get(connection_id).cloned())
    }

    pub fn counts(&self, room_id: &str) -> RoomStats {
        self.connections
            .lock()
            .map(|connections| count(&connections, room_id))
            .unwrap_or_default()
    }

    /// Forget every connection of a room, returning their ids
    pub fn clear_room(&self, room_id: &str) -> Vec<String> {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        let ids: Vec<String> = connections
            .values()
            .filter(|info| info.room_id == room_id)
            .map(|info| info.connection_id.clone())
            .collect();
        for id in &ids {
            connections.remove(id);
        }
        ids
    }
}

fn count(connections: &HashMap<String, ConnectionInfo>, room_id: &str) -> RoomStats {
    connections
        .values()
        .filter(|info| info.room_id == room_id)
        .fold(RoomStats::default(), |mut stats, info| {
            stats.connected_users += 1;
            match info.role {
                UserRole::Controller => stats.total_controllers += 1,
                UserRole::Viewer => stats.total_viewers += 1,
            }
            stats
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_subscriptions() {
        let presence = PresenceTracker::new();
        presence.subscribe("ROOM01", "c1", UserRole::Controller, None);
        presence.subscribe("ROOM01", "c2", UserRole::Viewer, None);
        let stats = presence.subscribe("ROOM02", "c3", UserRole::Viewer, None);
        assert_eq!(stats.connected_users, 1);

        let stats = presence.counts("ROOM01");
        assert_eq!(
            (stats.connected_users, stats.total_controllers, stats.total_viewers),
            (2, 1, 1)
        );

        let (room_id, stats) = presence.unsubscribe("c1").unwrap();
        assert_eq!(room_id, "ROOM01");
        assert_eq!(stats.total_controllers, 0);
        assert!(presence.unsubscribe("c1").is_none());
    }

    #[test]
    fn resubscribing_moves_connection() {
        let presence = PresenceTracker::new();
        presence.subscribe("ROOM01", "c1", UserRole::Viewer, None);
        presence.subscribe("ROOM02", "c1", UserRole::Controller, Some("kiosk".to_string()));

        assert_eq!(presence.counts("ROOM01").connected_users, 0);
        assert_eq!(presence.connection("c1").unwrap().room_id, "ROOM02");
    }

    #[test]
    fn unknown_roles_are_viewers() {
        assert_eq!(UserRole::parse(Some("CONTROLLER")), UserRole::Controller);
        assert_eq!(UserRole::parse(Some("admin")), UserRole::Viewer);
        assert_eq!(UserRole::parse(None), UserRole::Viewer);
    }

    #[test]
    fn clear_room_drops_its_connections() {
        let presence = PresenceTracker::new();
        presence.subscribe("ROOM01", "c1", UserRole::Viewer, None);
        presence.subscribe("ROOM02", "c2", UserRole::Viewer, None);

        assert_eq!(presence.clear_room("ROOM01"), vec!["c1".to_string()]);
        assert_eq!(presence.counts("ROOM02").connected_users, 1);
    }
}
