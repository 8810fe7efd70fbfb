//! Periodic sweep of expired rooms

use std::{sync::Arc, time::Duration};

use tokio::time::interval;
use tracing::{info, warn};

use crate::state::AppState;

/// Background task that reconciles the active room index every `period`
pub async fn room_cleanup_task(state: Arc<AppState>, period: Duration) {
    info!("Starting room cleanup task (every {}s)", period.as_secs());

    let mut interval = interval(period);
    // The first tick completes immediately; skip the sweep at startup
    interval.tick().await;

    loop {
        interval.tick().await;

        match state.cleanup_expired_rooms().await {
            Ok(0) => {}
            Ok(removed) => info!("Room cleanup removed {} rooms", removed),
            Err(e) => warn!("Room cleanup failed: {}", e),
        }
    }
}
