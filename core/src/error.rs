use crate::{
    config::TimeWindow,
    engine::ReconcileReport,
    types::{CalendarDay, ReminderTarget},
};
use chrono::NaiveDateTime;
use std::fmt;
use thiserror::Error;

/// Failures reported by host collaborators (alarm service, preference store).
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Alarm service error {code}: {message}")]
    Service { code: i32, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Invalid reminder window {window}: start must precede end within one day")]
    InvalidWindow { window: TimeWindow },

    #[error("Listing scheduled alarms failed: {source}")]
    ListingFailed {
        #[source]
        source: HostError,
    },

    #[error("Scheduling the {day} alarm at {time} failed: {source}")]
    ScheduleFailed {
        day:  CalendarDay,
        time: NaiveDateTime,
        #[source]
        source: HostError,
    },

    #[error("Reminder count {count} exceeds the maximum of {max}")]
    TargetOutOfRange { count: ReminderTarget, max: ReminderTarget },

    #[error("No calendar day follows {day}")]
    DayOutOfRange { day: CalendarDay },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReminderResult<T> = Result<T, ReminderError>;

/// Everything that went wrong during one reconciliation pass, plus what
/// still got done.
#[derive(Debug)]
pub struct ReconcileError {
    pub failures: Vec<ReminderError>,
    pub report:   ReconcileReport,
}

impl ReconcileError {
    pub fn schedule_failures(&self) -> impl Iterator<Item = &ReminderError> {
        self.failures
            .iter()
            .filter(|e| matches!(e, ReminderError::ScheduleFailed { .. }))
    }

    pub fn has_listing_failure(&self) -> bool {
        self.failures
            .iter()
            .any(|e| matches!(e, ReminderError::ListingFailed { .. }))
    }

    pub fn has_invalid_window(&self) -> bool {
        self.failures
            .iter()
            .any(|e| matches!(e, ReminderError::InvalidWindow { .. }))
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reconciliation finished with {} failure(s)", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures.first().map(|e| e as _)
    }
}
