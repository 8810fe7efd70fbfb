//! Server-sent event stream of a room

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use tokio::{runtime::Handle, sync::broadcast::error::RecvError};
use tracing::{debug, warn};

use crate::{
    events::EventEnvelope,
    services::UserRole,
    state::{AppState, RoomSubscription},
};

use super::{requests::SubscribeQuery, responses::ApiError};

/// Leaves the room when the client's stream is dropped
struct LeaveOnDrop {
    state: Arc<AppState>,
    connection_id: String,
}

impl Drop for LeaveOnDrop {
    fn drop(&mut self) {
        let state = Arc::clone(&self.state);
        let connection_id = std::mem::take(&mut self.connection_id);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = state.leave_room(&connection_id).await {
                    warn!("Failed to leave room for {}: {}", connection_id, e);
                }
            });
        }
    }
}

/// Handle GET /api/v1/rooms/:room_id/events
///
/// Joins the room, sends the room snapshot first, then every room event.
pub async fn room_events_handler(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let role = UserRole::parse(query.role.as_deref());
    let subscription = state.join_room(&room_id, role, query.client).await?;
    let guard = LeaveOnDrop {
        state: Arc::clone(&state),
        connection_id: subscription.connection_id.clone(),
    };

    let events = stream::unfold((subscription, guard), |(mut subscription, guard)| async move {
        let envelope = next_envelope(&mut subscription).await?;
        Some((Ok::<_, Infallible>(to_event(&envelope)), (subscription, guard)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Direct messages first, then the room stream; `None` once the room closes
async fn next_envelope(subscription: &mut RoomSubscription) -> Option<EventEnvelope> {
    loop {
        tokio::select! {
            biased;

            Some(envelope) = subscription.direct.recv() => return Some(envelope),

            result = subscription.room_events.recv() => match result {
                Ok(envelope) => return Some(envelope),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Connection {} lagged, skipped {} events",
                        subscription.connection_id, skipped
                    );
                }
                Err(RecvError::Closed) => {
                    debug!("Room {} closed", subscription.room_id);
                    return None;
                }
            },
        }
    }
}

fn to_event(envelope: &EventEnvelope) -> Event {
    let event = Event::default().event(envelope.event.kind());
    match serde_json::to_string(envelope) {
        Ok(json) => event.data(json),
        Err(e) => {
            warn!("Failed to encode {}: {}", envelope.event.kind(), e);
            event.comment("encoding error")
        }
    }
}
