//! Read-only view over the alarms the host has registered for us.
//!
//! RULE: A failed listing is never "zero alarms". Treating it as zero
//! would schedule a full day's worth on every transient failure.

use crate::{
    error::{ReminderError, ReminderResult},
    host::AlarmSink,
    types::{CalendarDay, ScheduledAlarmRecord},
};
use std::collections::BTreeMap;

pub struct AlarmInventory<'a, S: AlarmSink + ?Sized> {
    sink: &'a S,
}

impl<'a, S: AlarmSink + ?Sized> AlarmInventory<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    /// Fresh snapshot of every registered alarm.
    pub fn list_all(&self) -> ReminderResult<Vec<ScheduledAlarmRecord>> {
        self.sink.list_registered().map_err(|source| {
            log::warn!("inventory: listing failed: {source}");
            ReminderError::ListingFailed { source }
        })
    }

    /// Alarms registered on `day`.
    pub fn count_for_day(&self, day: CalendarDay) -> ReminderResult<usize> {
        let count = self
            .list_all()?
            .iter()
            .filter(|record| day.is_same_day(&record.fire_at))
            .count();
        log::debug!("inventory: {count} alarm(s) on {day}");
        Ok(count)
    }

    /// Alarm count per calendar day, in date order.
    pub fn bucket_by_day(&self) -> ReminderResult<BTreeMap<CalendarDay, usize>> {
        let mut buckets = BTreeMap::new();
        for record in self.list_all()? {
            *buckets.entry(record.day()).or_insert(0) += 1;
        }
        Ok(buckets)
    }
}
