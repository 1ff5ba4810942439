//! Collaborators the host integration must provide.
//!
//! RULE: The core never talks to a platform API directly.
//! Alarm registration, preference storage and alarm-fire effects all
//! go through these traits. store.rs is the SQLite-backed reference
//! implementation; tests bring their own fakes.

use crate::{
    error::HostError,
    types::{AlarmId, LaunchContext, ScheduledAlarmRecord},
};
use chrono::NaiveDateTime;

/// The platform alarm service.
pub trait AlarmSink {
    /// Register a one-shot alarm at a local wall-clock time. When it fires
    /// the host delivers `launch` back to the app.
    fn schedule_at(
        &mut self,
        fire_at: NaiveDateTime,
        launch: &LaunchContext,
    ) -> Result<AlarmId, HostError>;

    /// Every alarm this app holds for a day, including one-shots that have
    /// already fired. A fired alarm still counts toward its day.
    fn list_registered(&self) -> Result<Vec<ScheduledAlarmRecord>, HostError>;
}

/// The host's persistent preference store.
pub trait KeyValueStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>, HostError>;

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), HostError>;
}

/// Vibration played when a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationPattern {
    pub pulses:   u32,
    pub on_ms:    u32,
    pub pause_ms: u32,
}

impl Default for VibrationPattern {
    fn default() -> Self {
        Self {
            pulses:   3,
            on_ms:    300,
            pause_ms: 300,
        }
    }
}

impl VibrationPattern {
    /// Wall time from the first pulse starting to the last pause ending.
    pub fn total_ms(&self) -> u32 {
        self.pulses * (self.on_ms + self.pause_ms)
    }
}

/// Physical side effects of a reminder going off.
pub trait FireActuator {
    /// Turn the display on and keep it on for `hold_ms`.
    fn wake_display(&mut self, hold_ms: u32) -> Result<(), HostError>;

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), HostError>;
}

/// Actuator for hosts without a screen or haptics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActuator;

impl FireActuator for NoopActuator {
    fn wake_display(&mut self, _hold_ms: u32) -> Result<(), HostError> {
        Ok(())
    }

    fn vibrate(&mut self, _pattern: &VibrationPattern) -> Result<(), HostError> {
        Ok(())
    }
}

impl<T: AlarmSink + ?Sized> AlarmSink for &mut T {
    fn schedule_at(
        &mut self,
        fire_at: NaiveDateTime,
        launch: &LaunchContext,
    ) -> Result<AlarmId, HostError> {
        (**self).schedule_at(fire_at, launch)
    }

    fn list_registered(&self) -> Result<Vec<ScheduledAlarmRecord>, HostError> {
        (**self).list_registered()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get_int(&self, key: &str) -> Result<Option<i64>, HostError> {
        (**self).get_int(key)
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), HostError> {
        (**self).set_int(key, value)
    }
}
