//! Per-timer tick task

use std::time::Duration;

use tokio::{
    sync::oneshot,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error};

use crate::{
    services::{TickOutcome, TimerCoordinator},
    state::TICK_MILLIS,
};

/// Tick one running timer every second until it finishes or is cancelled
///
/// The first tick fires immediately. A failed tick is logged and retried on
/// the next interval.
pub async fn timer_tick_task(
    coordinator: TimerCoordinator,
    room_id: String,
    timer_id: String,
    generation: u64,
    mut cancel: oneshot::Receiver<()>,
) {
    debug!("Starting ticker for timer {} in room {}", timer_id, room_id);

    let mut interval = interval(Duration::from_millis(TICK_MILLIS));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut cancel => {
                debug!("Ticker for timer {} cancelled", timer_id);
                break;
            }

            _ = interval.tick() => {}
        }

        match coordinator.process_tick(&room_id, &timer_id, generation).await {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::Finished) => {
                debug!("Ticker for timer {} finished", timer_id);
                break;
            }
            Err(e) => {
                error!("Tick failed for timer {} in room {}: {}", timer_id, room_id, e);
            }
        }
    }
}
