//! Timer coordination: commands, tick scheduling and lifecycle events
//!
//! Every command and every tick runs the same cycle while holding the room
//! lock: load the room, mutate one timer, save the room, then publish the
//! events of that transition. Running timers own one ticker task each; the
//! task is registered here under the timer id together with a generation
//! number, and a ticker only acts while its generation is still registered.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    events::{EventPublisher, RoomEvent},
    state::{AlertBand, Room, Timer, TimerSettings, TimerState, TimerType, TransitionError, MAX_NAME_CHARS},
    tasks::timer_tick_task,
};

use super::RoomService;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimer {
    pub name: String,
    pub duration: u64,
    #[serde(rename = "type", default)]
    pub timer_type: TimerType,
    #[serde(default)]
    pub settings: Option<TimerSettings>,
}

/// Partial timer update; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimer {
    pub name: Option<String>,
    pub duration: Option<u64>,
    pub settings: Option<TimerSettings>,
}

/// What a ticker should do after one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

/// Registration of one running ticker
struct TickSchedule {
    room_id: String,
    generation: u64,
    /// Dropping the sender wakes the ticker, which then exits
    _cancel: oneshot::Sender<()>,
}

#[derive(Clone)]
pub struct TimerCoordinator {
    rooms: Arc<RoomService>,
    events: Arc<EventPublisher>,
    schedules: Arc<Mutex<HashMap<String, TickSchedule>>>,
    generations: Arc<AtomicU64>,
}

impl TimerCoordinator {
    pub fn new(rooms: Arc<RoomService>, events: Arc<EventPublisher>) -> Self {
        Self {
            rooms,
            events,
            schedules: Arc::new(Mutex::new(HashMap::new())),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn create_timer(&self, room_id: &str, request: CreateTimer) -> Result<Timer> {
        validate_name(&request.name)?;
        validate_duration(request.duration)?;

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let mut timer = Timer::new(request.name.trim(), request.duration, request.timer_type);
        if let Some(settings) = request.settings {
            timer.set_settings(settings);
        }

        room.add_timer(timer.clone())?;
        self.rooms.save_room(&mut room).await?;

        info!("Created timer {} in room {}", timer.id(), room_id);
        self.events.publish(room_id, RoomEvent::timer_created(&timer));
        Ok(timer)
    }

    /// Apply name, duration and settings; a running timer keeps running
    pub async fn update_timer(&self, room_id: &str, timer_id: &str, update: UpdateTimer) -> Result<Timer> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(duration) = update.duration {
            validate_duration(duration)?;
        }

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;

        let was_running = timer.state() == TimerState::Running;
        if was_running {
            timer.pause().map_err(|e| refused(timer_id, e))?;
        }
        if let Some(name) = update.name {
            timer.set_name(name.trim());
        }
        if let Some(duration) = update.duration {
            timer.set_duration(duration);
        }
        if let Some(settings) = update.settings {
            timer.set_settings(settings);
        }
        if was_running {
            timer.start(None).map_err(|e| refused(timer_id, e))?;
        }

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;

        info!("Updated timer {} in room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_updated(&timer));
        Ok(timer)
    }

    /// Start or resume; `start_time` overrides the recorded start timestamp
    pub async fn start_timer(
        &self,
        room_id: &str,
        timer_id: &str,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Timer> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;
        timer.start(start_time).map_err(|e| refused(timer_id, e))?;

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;
        self.schedule_ticks(room_id, timer_id);

        info!("Started timer {} in room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_started(&timer));
        Ok(timer)
    }

    pub async fn pause_timer(&self, room_id: &str, timer_id: &str) -> Result<Timer> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;
        timer.pause().map_err(|e| refused(timer_id, e))?;

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;
        self.cancel(timer_id);

        info!("Paused timer {} in room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_paused(&timer));
        Ok(timer)
    }

    pub async fn stop_timer(&self, room_id: &str, timer_id: &str) -> Result<Timer> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;
        timer.stop();

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;
        self.cancel(timer_id);

        info!("Stopped timer {} in room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_stopped(&timer));
        Ok(timer)
    }

    pub async fn reset_timer(&self, room_id: &str, timer_id: &str, new_duration: Option<u64>) -> Result<Timer> {
        if let Some(duration) = new_duration {
            validate_duration(duration)?;
        }

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;
        timer.reset(new_duration);

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;
        self.cancel(timer_id);

        info!("Reset timer {} in room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_reset(&timer));
        Ok(timer)
    }

    /// Shift the current time by `adjustment` milliseconds, clamped at zero
    pub async fn adjust_timer(&self, room_id: &str, timer_id: &str, adjustment: Option<i64>) -> Result<Timer> {
        let delta = adjustment.ok_or(Error::MissingArgument("adjustment"))?;

        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = find_timer(&mut room, room_id, timer_id)?;
        timer.adjust_time(delta);

        let timer = timer.clone();
        self.rooms.save_room(&mut room).await?;

        info!("Adjusted timer {} in room {} by {}ms", timer_id, room_id, delta);
        self.events.publish(room_id, RoomEvent::timer_adjusted(&timer));
        Ok(timer)
    }

    pub async fn delete_timer(&self, room_id: &str, timer_id: &str) -> Result<()> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;
        let timer = room.remove_timer(timer_id).ok_or_else(|| Error::TimerNotFound {
            room_id: room_id.to_string(),
            timer_id: timer_id.to_string(),
        })?;

        self.rooms.save_room(&mut room).await?;
        self.cancel(timer_id);

        info!("Deleted timer {} from room {}", timer_id, room_id);
        self.events.publish(room_id, RoomEvent::timer_deleted(&timer));
        Ok(())
    }

    /// Stop every running timer of a room, returning how many were stopped
    pub async fn stop_all_timers(&self, room_id: &str) -> Result<usize> {
        let (_guard, mut room) = self.rooms.lock_room(room_id).await?;

        let stopped: Vec<RoomEvent> = room
            .timers_mut()
            .filter(|timer| timer.state() == TimerState::Running)
            .map(|timer| {
                timer.stop();
                RoomEvent::timer_stopped(timer)
            })
            .collect();
        if stopped.is_empty() {
            return Ok(0);
        }

        self.rooms.save_room(&mut room).await?;
        for event in &stopped {
            if let Some(timer_id) = event.timer_id() {
                self.cancel(timer_id);
            }
        }

        info!("Stopped {} timers in room {}", stopped.len(), room_id);
        let count = stopped.len();
        self.events.publish_all(room_id, stopped);
        Ok(count)
    }

    /// One step of a ticker: reload, tick, detect edges, save, publish
    pub(crate) async fn process_tick(&self, room_id: &str, timer_id: &str, generation: u64) -> Result<TickOutcome> {
        let _guard = self.rooms.lock(room_id).await;
        if !self.is_current(timer_id, generation) {
            return Ok(TickOutcome::Finished);
        }

        let Some(mut room) = self.rooms.get_room(room_id).await? else {
            debug!("Room {} is gone, stopping ticker for {}", room_id, timer_id);
            self.cancel_if_current(timer_id, generation);
            return Ok(TickOutcome::Finished);
        };

        let (events, finished) = match room.timer_mut(timer_id) {
            Some(timer) if timer.state() == TimerState::Running => advance(timer),
            _ => {
                debug!("Timer {} no longer running, stopping ticker", timer_id);
                self.cancel_if_current(timer_id, generation);
                return Ok(TickOutcome::Finished);
            }
        };

        self.rooms.save_room(&mut room).await?;
        if finished {
            info!("Timer {} in room {} completed", timer_id, room_id);
            self.cancel_if_current(timer_id, generation);
        }
        self.events.publish_all(room_id, events);

        Ok(if finished {
            TickOutcome::Finished
        } else {
            TickOutcome::Continue
        })
    }

    pub fn is_scheduled(&self, timer_id: &str) -> bool {
        self.schedules().contains_key(timer_id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.schedules().len()
    }

    /// Cancel the tickers of every timer in a room
    pub fn cancel_room_schedules(&self, room_id: &str) -> usize {
        let mut schedules = self.schedules();
        let before = schedules.len();
        schedules.retain(|_, schedule| schedule.room_id != room_id);
        before - schedules.len()
    }

    pub fn cancel_all(&self) {
        let mut schedules = self.schedules();
        if !schedules.is_empty() {
            info!("Cancelling {} running tickers", schedules.len());
        }
        schedules.clear();
    }

    fn schedules(&self) -> MutexGuard<'_, HashMap<String, TickSchedule>> {
        self.schedules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_ticks(&self, room_id: &str, timer_id: &str) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        self.schedules().insert(
            timer_id.to_string(),
            TickSchedule {
                room_id: room_id.to_string(),
                generation,
                _cancel: cancel_tx,
            },
        );

        tokio::spawn(timer_tick_task(
            self.clone(),
            room_id.to_string(),
            timer_id.to_string(),
            generation,
            cancel_rx,
        ));
        debug!("Scheduled ticker {} for timer {}", generation, timer_id);
    }

    fn cancel(&self, timer_id: &str) -> bool {
        let cancelled = self.schedules().remove(timer_id).is_some();
        if cancelled {
            debug!("Cancelled ticker for timer {}", timer_id);
        }
        cancelled
    }

    fn is_current(&self, timer_id: &str, generation: u64) -> bool {
        self.schedules()
            .get(timer_id)
            .is_some_and(|schedule| schedule.generation == generation)
    }

    fn cancel_if_current(&self, timer_id: &str, generation: u64) {
        let mut schedules = self.schedules();
        if schedules
            .get(timer_id)
            .is_some_and(|schedule| schedule.generation == generation)
        {
            schedules.remove(timer_id);
        }
    }
}

/// Tick a running timer and collect the resulting events in emission order
fn advance(timer: &mut Timer) -> (Vec<RoomEvent>, bool) {
    let mut events = Vec::new();
    let before = timer.alert_band();

    timer.tick();

    match (before, timer.alert_band()) {
        (previous, AlertBand::Critical) if previous != AlertBand::Critical => {
            info!("Timer {} entered critical state", timer.id());
            events.push(RoomEvent::timer_critical(timer));
        }
        (previous, AlertBand::Warning) if previous != AlertBand::Warning => {
            info!("Timer {} entered warning state", timer.id());
            events.push(RoomEvent::timer_warning(timer));
        }
        _ => {}
    }

    let finished = timer.is_completed();
    if finished {
        timer.complete();
        events.push(RoomEvent::timer_completed(timer));

        if timer.settings().auto_reset {
            info!("Auto-resetting timer {}", timer.id());
            timer.reset(None);
            events.push(RoomEvent::timer_reset(timer));
        }
    }

    events.push(RoomEvent::timer_tick(timer));
    (events, finished)
}

fn find_timer<'a>(room: &'a mut Room, room_id: &str, timer_id: &str) -> Result<&'a mut Timer> {
    room.timer_mut(timer_id).ok_or_else(|| Error::TimerNotFound {
        room_id: room_id.to_string(),
        timer_id: timer_id.to_string(),
    })
}

fn refused(timer_id: &str, e: TransitionError) -> Error {
    Error::InvalidStateTransition {
        timer_id: timer_id.to_string(),
        state: e.from,
        action: e.action,
    }
}

fn validate_name(name: &str) -> Result<()> {
    let length = name.trim().chars().count();
    if length == 0 || length > MAX_NAME_CHARS {
        return Err(Error::InvalidArgument(format!(
            "timer name must be between 1 and {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(())
}

fn validate_duration(duration: u64) -> Result<()> {
    if duration == 0 {
        return Err(Error::InvalidArgument(
            "duration must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TICK_MILLIS;

    fn countdown(millis: u64, warning: u64, critical: u64) -> Timer {
        let mut timer = Timer::new("Session", millis, TimerType::Countdown).with_settings(TimerSettings {
            warning_time: warning,
            critical_time: critical,
            ..TimerSettings::default()
        });
        timer.start(None).unwrap();
        timer
    }

    fn kinds(events: &[RoomEvent]) -> Vec<&'static str> {
        events.iter().map(RoomEvent::kind).collect()
    }

    #[test]
    fn band_edges_fire_once_each() {
        let mut timer = countdown(305 * TICK_MILLIS, 300 * TICK_MILLIS, 60 * TICK_MILLIS);
        let mut warnings = 0;
        let mut criticals = 0;

        while timer.current_time() > 59 * TICK_MILLIS {
            let (events, _) = advance(&mut timer);
            for event in &events {
                match event {
                    RoomEvent::TimerWarning(alert) => {
                        assert_eq!(alert.current_time, 300 * TICK_MILLIS);
                        warnings += 1;
                    }
                    RoomEvent::TimerCritical(alert) => {
                        assert_eq!(alert.current_time, 60 * TICK_MILLIS);
                        criticals += 1;
                    }
                    _ => {}
                }
            }
        }

        assert_eq!((warnings, criticals), (1, 1));
    }

    #[test]
    fn critical_suppresses_warning_when_bounds_overlap() {
        let mut timer = countdown(3 * TICK_MILLIS, TICK_MILLIS, 2 * TICK_MILLIS);
        let (events, _) = advance(&mut timer);
        assert_eq!(kinds(&events), vec!["TIMER_CRITICAL", "TIMER_TICK"]);
        let (events, _) = advance(&mut timer);
        assert_eq!(kinds(&events), vec!["TIMER_TICK"]);
    }

    #[test]
    fn completion_with_auto_reset_emits_completed_then_reset() {
        let mut timer = countdown(TICK_MILLIS, 0, 0);
        let mut settings = timer.settings().clone();
        settings.auto_reset = true;
        timer.set_settings(settings);

        let (events, finished) = advance(&mut timer);

        assert!(finished);
        assert_eq!(
            kinds(&events),
            vec!["TIMER_COMPLETED", "TIMER_RESET", "TIMER_TICK"]
        );
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.current_time(), TICK_MILLIS);
    }

    #[test]
    fn name_and_duration_validation() {
        assert!(validate_name("Opening").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(1).is_ok());
    }
}
