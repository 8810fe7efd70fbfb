//! Timer entity: a single countdown or stopwatch state machine
//!
//! All durations are milliseconds. A tick advances a running timer by one
//! second of wall-clock time, i.e. [`TICK_MILLIS`] units.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Units a running timer moves per tick
pub const TICK_MILLIS: u64 = 1_000;

/// Longest accepted timer name, in characters
pub const MAX_NAME_CHARS: usize = 100;

/// Counting direction of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerType {
    #[default]
    Countdown,
    Stopwatch,
}

/// Lifecycle state of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    #[default]
    Stopped,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimerState::Stopped => "STOPPED",
            TimerState::Running => "RUNNING",
            TimerState::Paused => "PAUSED",
            TimerState::Completed => "COMPLETED",
        };
        f.write_str(label)
    }
}

/// Transitions that can be refused by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Pause,
}

impl fmt::Display for TimerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerAction::Start => f.write_str("start"),
            TimerAction::Pause => f.write_str("pause"),
        }
    }
}

/// Returned when a transition is not allowed from the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a timer that is {from}")]
pub struct TransitionError {
    pub from: TimerState,
    pub action: TimerAction,
}

/// Threshold band a countdown is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertBand {
    Normal,
    Warning,
    Critical,
}

/// Per-timer alerting and behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerSettings {
    /// Remaining time at which the warning band starts
    pub warning_time: u64,
    /// Remaining time at which the critical band starts
    pub critical_time: u64,
    pub auto_reset: bool,
    pub play_sound: bool,
    pub show_notifications: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            warning_time: 300_000,
            critical_time: 60_000,
            auto_reset: false,
            play_sound: true,
            show_notifications: true,
        }
    }
}

/// A countdown or stopwatch owned by a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    id: String,
    name: String,
    duration: u64,
    current_time: u64,
    state: TimerState,
    #[serde(rename = "type")]
    timer_type: TimerType,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    /// Accumulated time spent paused since the last stop
    paused_duration: u64,
    settings: TimerSettings,
}

impl Timer {
    /// Create a stopped timer with default settings
    pub fn new(name: impl Into<String>, duration: u64, timer_type: TimerType) -> Self {
        let current_time = match timer_type {
            TimerType::Countdown => duration,
            TimerType::Stopwatch => 0,
        };

        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            duration,
            current_time,
            state: TimerState::Stopped,
            timer_type,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            completed_at: None,
            paused_duration: 0,
            settings: TimerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: TimerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn current_time(&self) -> u64 {
        self.current_time
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn timer_type(&self) -> TimerType {
        self.timer_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn paused_duration(&self) -> u64 {
        self.paused_duration
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Change the duration; a stopped timer is rewound to the new starting point
    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
        if self.state == TimerState::Stopped {
            self.current_time = self.initial_time();
        }
    }

    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
    }

    /// Start or resume the timer
    ///
    /// `started_at` overrides the recorded start timestamp when the caller
    /// supplies one (e.g. a client-side scheduled start).
    pub fn start(&mut self, started_at: Option<DateTime<Utc>>) -> Result<(), TransitionError> {
        self.start_at(Utc::now(), started_at)
    }

    pub(crate) fn start_at(
        &mut self,
        now: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<(), TransitionError> {
        match self.state {
            TimerState::Stopped | TimerState::Paused => {}
            from => {
                return Err(TransitionError {
                    from,
                    action: TimerAction::Start,
                })
            }
        }

        self.state = TimerState::Running;
        self.started_at = Some(started_at.unwrap_or(now));

        if let Some(paused_at) = self.paused_at.take() {
            let paused_for = (now - paused_at).num_milliseconds().max(0) as u64;
            self.paused_duration = self.paused_duration.saturating_add(paused_for);
        }

        Ok(())
    }

    /// Pause a running timer
    pub fn pause(&mut self) -> Result<(), TransitionError> {
        self.pause_at(Utc::now())
    }

    pub(crate) fn pause_at(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.state != TimerState::Running {
            return Err(TransitionError {
                from: self.state,
                action: TimerAction::Pause,
            });
        }

        self.state = TimerState::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    /// Stop from any state and rewind to the starting point
    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
        self.started_at = None;
        self.paused_at = None;
        self.paused_duration = 0;
        self.current_time = self.initial_time();
    }

    /// Stop, optionally replacing the duration first
    pub fn reset(&mut self, new_duration: Option<u64>) {
        if let Some(duration) = new_duration {
            self.duration = duration;
        }
        self.stop();
    }

    /// Shift the current time by `delta`, never below zero
    pub fn adjust_time(&mut self, delta: i64) {
        self.current_time = if delta >= 0 {
            self.current_time.saturating_add(delta.unsigned_abs())
        } else {
            self.current_time.saturating_sub(delta.unsigned_abs())
        };
    }

    /// Advance a running timer by one tick; no-op in any other state
    pub fn tick(&mut self) {
        self.tick_at(Utc::now());
    }

    pub(crate) fn tick_at(&mut self, now: DateTime<Utc>) {
        if self.state != TimerState::Running {
            return;
        }

        match self.timer_type {
            TimerType::Countdown => {
                self.current_time = self.current_time.saturating_sub(TICK_MILLIS);
                if self.current_time == 0 {
                    self.state = TimerState::Completed;
                    self.completed_at = Some(now);
                }
            }
            TimerType::Stopwatch => {
                self.current_time = self.current_time.saturating_add(TICK_MILLIS);
            }
        }
    }

    /// Force the completed state, keeping the first completion timestamp
    pub fn complete(&mut self) {
        self.state = TimerState::Completed;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_in_warning_state(&self) -> bool {
        self.timer_type == TimerType::Countdown
            && self.current_time <= self.settings.warning_time
            && self.current_time > self.settings.critical_time
    }

    pub fn is_in_critical_state(&self) -> bool {
        self.timer_type == TimerType::Countdown
            && self.current_time <= self.settings.critical_time
            && self.current_time > 0
    }

    pub fn is_completed(&self) -> bool {
        self.state == TimerState::Completed
            || (self.timer_type == TimerType::Countdown && self.current_time == 0)
    }

    /// Band used for edge detection; critical wins over warning
    pub fn alert_band(&self) -> AlertBand {
        if self.is_in_critical_state() {
            AlertBand::Critical
        } else if self.is_in_warning_state() {
            AlertBand::Warning
        } else {
            AlertBand::Normal
        }
    }

    /// Wall-clock milliseconds since the latest start or resume
    pub fn elapsed_time(&self) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };

        let end = match self.state {
            TimerState::Running => Utc::now(),
            _ => self.paused_at.or(self.completed_at).unwrap_or_else(Utc::now),
        };

        (end - started_at).num_milliseconds().max(0) as u64
    }

    pub fn remaining_time(&self) -> u64 {
        match self.timer_type {
            TimerType::Countdown => self.current_time,
            TimerType::Stopwatch => self.duration.saturating_sub(self.current_time),
        }
    }

    fn initial_time(&self) -> u64 {
        match self.timer_type {
            TimerType::Countdown => self.duration,
            TimerType::Stopwatch => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn countdown(seconds: u64) -> Timer {
        Timer::new("Keynote", seconds * TICK_MILLIS, TimerType::Countdown)
    }

    #[test]
    fn tick_is_noop_unless_running() {
        let mut timer = countdown(10);
        for state in [TimerState::Stopped, TimerState::Paused, TimerState::Completed] {
            timer.state = state;
            let before = timer.clone();
            timer.tick();
            assert_eq!(timer, before);
        }
    }

    #[test]
    fn countdown_completes_after_duration_ticks_despite_pauses() {
        let mut timer = countdown(12);
        let mut now = Utc::now();
        timer.start_at(now, None).unwrap();

        for i in 0..12 {
            if i % 4 == 3 {
                timer.pause_at(now).unwrap();
                now += Duration::seconds(30);
                timer.start_at(now, None).unwrap();
            }
            timer.tick_at(now);
            now += Duration::seconds(1);
        }

        assert_eq!(timer.state(), TimerState::Completed);
        assert_eq!(timer.current_time(), 0);
        assert_eq!(timer.paused_duration(), 90_000);
        assert!(timer.completed_at().is_some());
    }

    #[test]
    fn stopwatch_counts_up_without_completing() {
        let mut timer = Timer::new("Lap", 2_000, TimerType::Stopwatch);
        timer.start(None).unwrap();
        for _ in 0..5 {
            timer.tick();
        }
        assert_eq!(timer.current_time(), 5_000);
        assert_eq!(timer.state(), TimerState::Running);
        assert!(!timer.is_completed());
    }

    #[test]
    fn stop_twice_is_same_as_once() {
        let mut timer = countdown(60);
        timer.start(None).unwrap();
        timer.tick();
        timer.stop();
        let once = timer.clone();
        timer.stop();
        assert_eq!(timer, once);
        assert_eq!(timer.current_time(), 60_000);
        assert!(timer.started_at().is_none());
    }

    #[test]
    fn start_refuses_running_and_completed() {
        let mut timer = countdown(1);
        timer.start(None).unwrap();
        let err = timer.start(None).unwrap_err();
        assert_eq!(err.from, TimerState::Running);

        timer.tick();
        assert_eq!(timer.state(), TimerState::Completed);
        assert!(timer.start(None).is_err());
    }

    #[test]
    fn pause_only_from_running() {
        let mut timer = countdown(5);
        let err = timer.pause().unwrap_err();
        assert_eq!(err.action, TimerAction::Pause);
        assert_eq!(err.from, TimerState::Stopped);
    }

    #[test]
    fn explicit_start_time_is_recorded() {
        let mut timer = countdown(5);
        let scheduled = Utc::now() - Duration::minutes(2);
        timer.start(Some(scheduled)).unwrap();
        assert_eq!(timer.started_at(), Some(scheduled));
    }

    #[test]
    fn adjust_clamps_at_zero() {
        let mut timer = countdown(5);
        let current = timer.current_time() as i64;
        timer.adjust_time(-current - 1);
        assert_eq!(timer.current_time(), 0);
        assert_eq!(timer.state(), TimerState::Stopped);

        timer.adjust_time(i64::MIN);
        assert_eq!(timer.current_time(), 0);
        timer.adjust_time(2_500);
        assert_eq!(timer.current_time(), 2_500);
    }

    #[test]
    fn reset_with_new_duration_rewinds() {
        let mut timer = countdown(5);
        timer.start(None).unwrap();
        timer.tick();
        timer.reset(Some(90_000));
        assert_eq!(timer.duration(), 90_000);
        assert_eq!(timer.current_time(), 90_000);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn set_duration_rewinds_only_when_stopped() {
        let mut timer = countdown(5);
        timer.set_duration(8_000);
        assert_eq!(timer.current_time(), 8_000);

        timer.start(None).unwrap();
        timer.tick();
        timer.set_duration(20_000);
        assert_eq!(timer.current_time(), 7_000);
    }

    #[test]
    fn critical_band_takes_priority() {
        let mut timer = countdown(10).with_settings(TimerSettings {
            warning_time: 5_000,
            critical_time: 5_000,
            ..TimerSettings::default()
        });
        timer.current_time = 4_000;
        assert!(!timer.is_in_warning_state());
        assert_eq!(timer.alert_band(), AlertBand::Critical);

        timer.current_time = 0;
        assert_eq!(timer.alert_band(), AlertBand::Normal);
        assert!(timer.is_completed());
    }

    #[test]
    fn stopwatch_is_never_in_alert_bands() {
        let timer = Timer::new("Open", 1_000, TimerType::Stopwatch);
        assert_eq!(timer.alert_band(), AlertBand::Normal);
    }

    #[test]
    fn settings_survive_serialization() {
        let settings = TimerSettings {
            warning_time: 120_000,
            critical_time: 15_000,
            auto_reset: true,
            play_sound: false,
            show_notifications: false,
        };
        let timer = countdown(300).with_settings(settings.clone());

        let json = serde_json::to_string(&timer).unwrap();
        assert!(json.contains("\"type\":\"COUNTDOWN\""));
        assert!(json.contains("\"warningTime\":120000"));

        let restored: Timer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.settings(), &settings);
        assert_eq!(restored, timer);
    }
}
