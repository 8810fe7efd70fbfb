//! Delivery of room events to connected subscribers

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::EventEnvelope;

/// Buffered envelopes per room before slow subscribers start lagging
const ROOM_CHANNEL_CAPACITY: usize = 256;

/// Transport that fans room events out to subscribers
pub trait EventSink: Send + Sync {
    /// Deliver to every current subscriber of `envelope.room_id`
    fn broadcast(&self, envelope: EventEnvelope);

    /// Deliver to a single connection; returns false if it is gone
    fn send_to(&self, connection_id: &str, envelope: EventEnvelope) -> bool;
}

/// In-process sink: one broadcast channel per room, one mpsc per connection
#[derive(Debug, Default)]
pub struct BroadcastSink {
    rooms: Mutex<HashMap<String, broadcast::Sender<EventEnvelope>>>,
    connections: Mutex<HashMap<String, mpsc::UnboundedSender<EventEnvelope>>>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event broadcast to `room_id` from now on
    pub fn subscribe_room(&self, room_id: &str) -> broadcast::Receiver<EventEnvelope> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Open the unicast channel for a connection
    pub fn register_connection(&self, connection_id: &str) -> mpsc::UnboundedReceiver<EventEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut connections) = self.connections.lock() {
            connections.insert(connection_id.to_string(), tx);
        }
        rx
    }

    pub fn remove_connection(&self, connection_id: &str) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.remove(connection_id);
        }
    }

    /// Drop the room channel; subscribers see the stream end once drained
    pub fn close_room(&self, room_id: &str) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.remove(room_id);
        }
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.rooms
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(room_id).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }
}

impl EventSink for BroadcastSink {
    fn broadcast(&self, envelope: EventEnvelope) {
        let Ok(rooms) = self.rooms.lock() else {
            return;
        };

        match rooms.get(&envelope.room_id) {
            Some(tx) => {
                let kind = envelope.event.kind();
                let room_id = envelope.room_id.clone();
                if tx.send(envelope).is_err() {
                    debug!("No subscribers for {} in room {}", kind, room_id);
                }
            }
            None => debug!(
                "Room {} has no channel, dropping {}",
                envelope.room_id,
                envelope.event.kind()
            ),
        }
    }

    fn send_to(&self, connection_id: &str, envelope: EventEnvelope) -> bool {
        let Ok(connections) = self.connections.lock() else {
            return false;
        };

        match connections.get(connection_id) {
            Some(tx) => tx.send(envelope).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RoomEvent, RoomRemoved};

    fn deleted(room_id: &str) -> EventEnvelope {
        EventEnvelope::new(
            room_id,
            RoomEvent::RoomDeleted(RoomRemoved {
                id: room_id.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn broadcast_reaches_only_room_subscribers() {
        let sink = BroadcastSink::new();
        let mut a = sink.subscribe_room("AAAAAA");
        let mut b = sink.subscribe_room("BBBBBB");

        sink.broadcast(deleted("AAAAAA"));

        assert_eq!(a.recv().await.unwrap().room_id, "AAAAAA");
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unicast_requires_registered_connection() {
        let sink = BroadcastSink::new();
        assert!(!sink.send_to("conn-1", deleted("AAAAAA")));

        let mut rx = sink.register_connection("conn-1");
        assert!(sink.send_to("conn-1", deleted("AAAAAA")));
        assert!(rx.recv().await.is_some());

        sink.remove_connection("conn-1");
        assert!(!sink.send_to("conn-1", deleted("AAAAAA")));
    }

    #[tokio::test]
    async fn closing_room_ends_subscriber_streams() {
        let sink = BroadcastSink::new();
        let mut rx = sink.subscribe_room("AAAAAA");
        assert_eq!(sink.subscriber_count("AAAAAA"), 1);

        sink.close_room("AAAAAA");
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
