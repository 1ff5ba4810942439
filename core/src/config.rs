//! Reminder policy: the daily window and how many reminders to fire.
//!
//! Values come from three layers, highest first:
//!   1. Per-key overrides in the host's preference store
//!   2. PolicyDefaults loaded from a JSON file (optional)
//!   3. Built-in defaults: 08:00-22:00, 5 reminders
//!
//! RULE: Policy is read fresh on every call. Nothing here caches,
//! because the user may change a preference between two passes.

use crate::{
    error::{ReminderError, ReminderResult},
    host::KeyValueStore,
    types::ReminderTarget,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NUM_REMINDERS_KEY: &str = "num_reminders";
pub const START_TIME_HOURS_KEY: &str = "start_time_hours";
pub const START_TIME_MINS_KEY: &str = "start_time_mins";
pub const END_TIME_HOURS_KEY: &str = "end_time_hours";
pub const END_TIME_MINS_KEY: &str = "end_time_mins";

/// Most reminders one day may ask for. Anything above is treated as a
/// corrupt value, since a pass schedules its whole shortfall at once.
pub const MAX_TARGET_COUNT: ReminderTarget = 100;

/// Daily time-of-day interval reminders may fire in. No overnight wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_hour:   u32,
    pub start_minute: u32,
    pub end_hour:     u32,
    pub end_minute:   u32,
}

impl TimeWindow {
    pub fn new(start_hour: u32, start_minute: u32, end_hour: u32, end_minute: u32) -> Self {
        Self { start_hour, start_minute, end_hour, end_minute }
    }

    /// Resolve to (start, end) times of day. Out-of-range fields and
    /// `start >= end` are both `InvalidWindow`.
    pub fn validate(&self) -> ReminderResult<(NaiveTime, NaiveTime)> {
        let start = NaiveTime::from_hms_opt(self.start_hour, self.start_minute, 0);
        let end = NaiveTime::from_hms_opt(self.end_hour, self.end_minute, 0);
        match (start, end) {
            (Some(start), Some(end)) if start < end => Ok((start, end)),
            _ => Err(ReminderError::InvalidWindow { window: *self }),
        }
    }

    /// Length of the window in seconds, or 0 if it is invalid.
    pub fn span_secs(&self) -> i64 {
        self.validate()
            .map(|(start, end)| (end - start).num_seconds())
            .unwrap_or(0)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start_hour, self.start_minute, self.end_hour, self.end_minute
        )
    }
}

/// Fallback values used when the preference store has no override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    pub window:       TimeWindow,
    pub target_count: ReminderTarget,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            window:       TimeWindow::new(8, 0, 22, 0),
            target_count: 5,
        }
    }
}

impl PolicyDefaults {
    /// Load from a JSON file:
    /// `{"window": {"start_hour": 8, ...}, "target_count": 5}`
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let defaults: PolicyDefaults = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if defaults.target_count > MAX_TARGET_COUNT {
            anyhow::bail!(
                "{path}: target_count {} exceeds the maximum of {MAX_TARGET_COUNT}",
                defaults.target_count
            );
        }
        Ok(defaults)
    }
}

/// Read-through view of the policy over a preference store.
pub struct ReminderPolicy<'a, K: KeyValueStore + ?Sized> {
    store:    &'a K,
    defaults: PolicyDefaults,
}

impl<'a, K: KeyValueStore + ?Sized> ReminderPolicy<'a, K> {
    pub fn new(store: &'a K, defaults: PolicyDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn get_window(&self) -> TimeWindow {
        let d = self.defaults.window;
        TimeWindow {
            start_hour:   self.read_u32(START_TIME_HOURS_KEY, d.start_hour),
            start_minute: self.read_u32(START_TIME_MINS_KEY, d.start_minute),
            end_hour:     self.read_u32(END_TIME_HOURS_KEY, d.end_hour),
            end_minute:   self.read_u32(END_TIME_MINS_KEY, d.end_minute),
        }
    }

    pub fn get_target_count(&self) -> ReminderTarget {
        let default = self.defaults.target_count;
        let mut count = self.read_u32(NUM_REMINDERS_KEY, default);
        if count > MAX_TARGET_COUNT {
            log::warn!(
                "policy: ignoring {NUM_REMINDERS_KEY}={count} above {MAX_TARGET_COUNT}, using {default}"
            );
            count = default;
        }
        log::debug!("policy: target count {count}");
        count
    }

    /// Stored value if present and representable, otherwise `default`.
    fn read_u32(&self, key: &str, default: u32) -> u32 {
        match self.store.get_int(key) {
            Ok(Some(v)) => match u32::try_from(v) {
                Ok(v) => v,
                Err(_) => {
                    log::warn!("policy: ignoring out-of-range {key}={v}, using {default}");
                    default
                }
            },
            Ok(None) => default,
            Err(e) => {
                log::warn!("policy: reading {key} failed ({e}), using {default}");
                default
            }
        }
    }
}

/// Persist a new reminder count. Counts above MAX_TARGET_COUNT are rejected.
pub fn set_target_count<K: KeyValueStore + ?Sized>(
    store: &mut K,
    count: ReminderTarget,
) -> ReminderResult<()> {
    if count > MAX_TARGET_COUNT {
        return Err(ReminderError::TargetOutOfRange { count, max: MAX_TARGET_COUNT });
    }
    store.set_int(NUM_REMINDERS_KEY, i64::from(count))?;
    Ok(())
}

/// Persist a new window. Rejected up front if it is not a valid window.
pub fn set_window<K: KeyValueStore + ?Sized>(
    store: &mut K,
    window: TimeWindow,
) -> ReminderResult<()> {
    window.validate()?;
    store.set_int(START_TIME_HOURS_KEY, i64::from(window.start_hour))?;
    store.set_int(START_TIME_MINS_KEY, i64::from(window.start_minute))?;
    store.set_int(END_TIME_HOURS_KEY, i64::from(window.end_hour))?;
    store.set_int(END_TIME_MINS_KEY, i64::from(window.end_minute))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Prefs(HashMap<String, i64>);

    impl KeyValueStore for Prefs {
        fn get_int(&self, key: &str) -> Result<Option<i64>, HostError> {
            Ok(self.0.get(key).copied())
        }

        fn set_int(&mut self, key: &str, value: i64) -> Result<(), HostError> {
            self.0.insert(key.to_string(), value);
            Ok(())
        }
    }

    #[test]
    fn oversized_stored_count_falls_back_to_default() {
        let mut prefs = Prefs::default();
        prefs.set_int(NUM_REMINDERS_KEY, i64::from(u32::MAX)).unwrap();
        let policy = ReminderPolicy::new(&prefs, PolicyDefaults::default());
        assert_eq!(policy.get_target_count(), 5);

        prefs.set_int(NUM_REMINDERS_KEY, i64::from(MAX_TARGET_COUNT)).unwrap();
        let policy = ReminderPolicy::new(&prefs, PolicyDefaults::default());
        assert_eq!(policy.get_target_count(), MAX_TARGET_COUNT);
    }

    #[test]
    fn oversized_count_is_not_persisted() {
        let mut prefs = Prefs::default();
        let err = set_target_count(&mut prefs, MAX_TARGET_COUNT + 1).unwrap_err();
        assert!(matches!(err, ReminderError::TargetOutOfRange { .. }));
        assert!(prefs.0.is_empty());
    }

    #[test]
    fn default_window_is_valid() {
        let (start, end) = PolicyDefaults::default().window.validate().unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(PolicyDefaults::default().window.span_secs(), 14 * 3600);
    }

    #[test]
    fn empty_and_reversed_windows_are_rejected() {
        for w in [TimeWindow::new(10, 0, 10, 0), TimeWindow::new(22, 0, 8, 0)] {
            assert!(matches!(w.validate(), Err(ReminderError::InvalidWindow { .. })), "{w}");
            assert_eq!(w.span_secs(), 0);
        }
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        for w in [TimeWindow::new(8, 60, 22, 0), TimeWindow::new(8, 0, 24, 0)] {
            assert!(w.validate().is_err(), "{w} should be invalid");
        }
    }

    #[test]
    fn window_displays_as_clock_range() {
        assert_eq!(TimeWindow::new(8, 5, 21, 30).to_string(), "08:05-21:30");
    }

    #[test]
    fn defaults_parse_from_json() {
        let json = r#"{"window":{"start_hour":9,"start_minute":30,"end_hour":17,"end_minute":0},"target_count":3}"#;
        let d: PolicyDefaults = serde_json::from_str(json).unwrap();
        assert_eq!(d.window, TimeWindow::new(9, 30, 17, 0));
        assert_eq!(d.target_count, 3);
    }
}
