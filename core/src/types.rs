//! Shared primitive types used across the reminder core.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque handle the alarm subsystem assigns to a registered alarm.
pub type AlarmId = i64;

/// Number of reminders wanted per calendar day.
pub type ReminderTarget = u32;

/// Operation the host attaches to launches caused by one of our alarms.
pub const APP_CONTROL_OPERATION_ALARM_ONTIME: &str =
    "http://tizen.org/appcontrol/operation/my_ontime_alarm";
/// Operation for a plain launch from the app list.
pub const APP_CONTROL_OPERATION_MAIN: &str = "http://tizen.org/appcontrol/operation/main";
/// Operation the home-screen widget uses to open the app.
pub const APP_CONTROL_OPERATION_DEFAULT: &str = "http://tizen.org/appcontrol/operation/default";
/// Extra-data key carrying the id of the alarm that fired.
pub const APP_CONTROL_DATA_ALARM_ID: &str = "http://tizen.org/appcontrol/data/alarm_id";

/// A calendar date, used only for identity comparison and "next day".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The day a local wall-clock datetime falls on.
    pub fn of(datetime: &NaiveDateTime) -> Self {
        Self(datetime.date())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Same year, same month, same day-of-month.
    pub fn is_same_day(&self, other: &NaiveDateTime) -> bool {
        let other = other.date();
        self.0.year() == other.year() && self.0.month() == other.month() && self.0.day() == other.day()
    }

    /// The following calendar day. `None` only at the end of chrono's range.
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Snapshot of one alarm owned by the alarm subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarmRecord {
    pub alarm_id: AlarmId,
    pub fire_at:  NaiveDateTime,
}

impl ScheduledAlarmRecord {
    pub fn day(&self) -> CalendarDay {
        CalendarDay::of(&self.fire_at)
    }
}

/// What one day of a reconciliation pass is trying to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequest {
    pub target_day:   CalendarDay,
    pub target_count: ReminderTarget,
}

/// The host's launch request. Alarms are registered with one of these and
/// the host hands it back when the alarm fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub operation: String,
    #[serde(default)]
    pub extra:     BTreeMap<String, String>,
}

impl LaunchContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            extra:     BTreeMap::new(),
        }
    }

    /// The context every reminder alarm is registered with.
    pub fn alarm_launch() -> Self {
        Self::new(APP_CONTROL_OPERATION_ALARM_ONTIME)
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}
