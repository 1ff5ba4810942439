//! Reconciliation events: what a pass decided, in order.
//!
//! Every decision the engine makes is recorded as an event in the
//! pass report. Hosts may persist them (store.rs keeps an event_log
//! table) to answer "why did I get six reminders on Tuesday?".

use crate::types::{AlarmId, CalendarDay, ReminderTarget};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    PassStarted {
        now: NaiveDateTime,
    },
    DaySatisfied {
        day:      CalendarDay,
        existing: usize,
        target:   ReminderTarget,
    },
    ShortfallDetected {
        day:       CalendarDay,
        existing:  usize,
        target:    ReminderTarget,
        shortfall: usize,
    },
    AlarmScheduled {
        day:      CalendarDay,
        alarm_id: AlarmId,
        fire_at:  NaiveDateTime,
    },
    ScheduleFailed {
        day:     CalendarDay,
        fire_at: NaiveDateTime,
        reason:  String,
    },
    /// More alarms than wanted. Left alone; only cancellation removes them.
    ExcessIgnored {
        day:      CalendarDay,
        existing: usize,
        target:   ReminderTarget,
    },
    /// The day was not reconciled (bad window, unreadable inventory).
    DaySkipped {
        day:    CalendarDay,
        reason: String,
    },
    AlarmFired {
        alarm_id: Option<AlarmId>,
        at:       NaiveDateTime,
    },
    /// Shortfall on a day whose window has already closed.
    WindowElapsed {
        day:       CalendarDay,
        shortfall: usize,
    },
}

impl ReminderEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PassStarted { .. }       => "pass_started",
            Self::DaySatisfied { .. }      => "day_satisfied",
            Self::ShortfallDetected { .. } => "shortfall_detected",
            Self::AlarmScheduled { .. }    => "alarm_scheduled",
            Self::ScheduleFailed { .. }    => "schedule_failed",
            Self::ExcessIgnored { .. }     => "excess_ignored",
            Self::DaySkipped { .. }        => "day_skipped",
            Self::AlarmFired { .. }        => "alarm_fired",
            Self::WindowElapsed { .. }     => "window_elapsed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_matches_serde_tag() {
        let event = ReminderEvent::ExcessIgnored {
            day:      CalendarDay::from_ymd(2024, 1, 2).unwrap(),
            existing: 7,
            target:   5,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.type_name());
        assert_eq!(json["day"], "2024-01-02");
    }
}
