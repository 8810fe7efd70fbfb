//! HTTP API module
//!
//! Room, timer and message commands under `/api/v1/rooms`, the room event
//! stream and a health check.

pub mod handlers;
pub mod requests;
pub mod responses;
pub mod sse;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;
use sse::room_events_handler;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let timers = Router::new()
        .route("/", post(create_timer_handler))
        .route("/:timer_id", put(update_timer_handler).delete(delete_timer_handler))
        .route("/:timer_id/start", post(start_timer_handler))
        .route("/:timer_id/pause", post(pause_timer_handler))
        .route("/:timer_id/stop", post(stop_timer_handler))
        .route("/:timer_id/reset", post(reset_timer_handler))
        .route("/:timer_id/adjust", post(adjust_timer_handler));

    let messages = Router::new()
        .route("/", post(create_message_handler))
        .route("/:message_id", put(update_message_handler).delete(delete_message_handler))
        .route("/:message_id/show", post(show_message_handler))
        .route("/:message_id/hide", post(hide_message_handler));

    let rooms = Router::new()
        .route("/", post(create_room_handler))
        .route("/:room_id", get(get_room_handler).delete(delete_room_handler))
        .route("/:room_id/status", get(room_status_handler))
        .route("/:room_id/settings", put(update_room_settings_handler))
        .route("/:room_id/events", get(room_events_handler))
        .nest("/:room_id/timers", timers)
        .nest("/:room_id/messages", messages);

    Router::new()
        .nest("/api/v1/rooms", rooms)
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn app() -> Router {
        create_router(Arc::new(AppState::new(ServiceSettings::default())))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["runningTimers"], 0);
    }

    #[tokio::test]
    async fn timer_lifecycle_over_http() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/rooms", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let room_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/rooms/{room_id}/timers"),
            Some(serde_json::json!({ "name": "Keynote", "duration": 60000 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["type"], "COUNTDOWN");
        let timer_id = body["data"]["id"].as_str().unwrap().to_string();
        let timer_uri = format!("/api/v1/rooms/{room_id}/timers/{timer_id}");

        let (status, body) = send(&app, "POST", &format!("{timer_uri}/pause"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_TIMER_STATE");

        let (status, body) = send(&app, "POST", &format!("{timer_uri}/adjust"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "MISSING_ARGUMENT");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{timer_uri}/adjust"),
            Some(serde_json::json!({ "adjustment": -15000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currentTime"], 45000);

        let (status, body) = send(&app, "POST", &format!("{timer_uri}/stop"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "STOPPED");
        assert_eq!(body["data"]["currentTime"], 60000);

        let (status, _) = send(&app, "DELETE", &timer_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, "DELETE", &timer_uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "TIMER_NOT_FOUND");
    }

    #[tokio::test]
    async fn capacity_maps_to_conflict() {
        let app = app();
        let (_, body) = send(&app, "POST", "/api/v1/rooms", None).await;
        let room_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/v1/rooms/{room_id}/settings"),
            Some(serde_json::json!({ "maxTimers": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let timer = serde_json::json!({ "name": "Lap", "duration": 1000, "type": "STOPWATCH" });
        let uri = format!("/api/v1/rooms/{room_id}/timers");
        let (status, _) = send(&app, "POST", &uri, Some(timer.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, "POST", &uri, Some(timer)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "TIMER_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn unknown_rooms_are_not_found_but_have_status() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/v1/rooms/ZZZZZZ", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "ROOM_NOT_FOUND");

        let (status, body) = send(&app, "GET", "/api/v1/rooms/ZZZZZZ/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["exists"], false);
    }

    #[tokio::test]
    async fn message_validation_and_visibility() {
        let app = app();
        let (_, body) = send(&app, "POST", "/api/v1/rooms", None).await;
        let room_id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/rooms/{room_id}/messages");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({ "text": "Break", "color": "teal" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            "POST",
            &uri,
            Some(serde_json::json!({ "text": "Break", "priority": "HIGH" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["color"], "blue");
        let message_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("{uri}/{message_id}/hide"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["visible"], false);
    }
}
