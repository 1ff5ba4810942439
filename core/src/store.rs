//! SQLite-backed host integration.
//!
//! Stands in for the platform alarm service and preference store on
//! hosts that have neither (the headless runner, integration tests).
//!
//! RULE: Only store.rs talks to the database.
//! The engine sees this type only through AlarmSink and KeyValueStore.
//!
//! RULE: A fired alarm is marked, not deleted. It stays in the listed
//! inventory so it keeps counting toward its day; otherwise every fire
//! would read as a shortfall and be topped up again.

use crate::{
    error::HostError,
    event::ReminderEvent,
    host::{AlarmSink, KeyValueStore},
    types::{AlarmId, LaunchContext, ScheduledAlarmRecord},
};
use chrono::{DateTime, NaiveDateTime};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

pub struct HostStore {
    conn: Connection,
}

impl HostStore {
    /// Open (or create) the host database at `path`. URIs are accepted, so
    /// `file:name?mode=memory&cache=shared` lets several stores share one
    /// in-memory database.
    pub fn open(path: &str) -> Result<Self, HostError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self, HostError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> Result<(), HostError> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Alarms ─────────────────────────────────────────────────

    /// Remove one alarm. Returns false if it was not registered.
    pub fn cancel_alarm(&self, alarm_id: AlarmId) -> Result<bool, HostError> {
        let removed = self
            .conn
            .execute("DELETE FROM alarm WHERE alarm_id = ?1", params![alarm_id])?;
        Ok(removed > 0)
    }

    /// Remove every alarm, fired or pending. Teardown when the app exits
    /// for good; returns how many were removed.
    pub fn cancel_all(&self) -> Result<usize, HostError> {
        let removed = self.conn.execute("DELETE FROM alarm", [])?;
        log::info!("store: cancelled all {removed} alarm(s)");
        Ok(removed)
    }

    /// Record that an alarm went off. Returns false if it was unknown or
    /// had already fired.
    pub fn mark_fired(&self, alarm_id: AlarmId) -> Result<bool, HostError> {
        let updated = self.conn.execute(
            "UPDATE alarm SET fired = 1 WHERE alarm_id = ?1 AND fired = 0",
            params![alarm_id],
        )?;
        Ok(updated > 0)
    }

    /// Earliest alarm still waiting to fire, if any.
    pub fn next_alarm(&self) -> Result<Option<(ScheduledAlarmRecord, LaunchContext)>, HostError> {
        let row = self
            .conn
            .query_row(
                "SELECT alarm_id, fire_at, launch_json FROM alarm
                 WHERE fired = 0
                 ORDER BY fire_at ASC, alarm_id ASC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(id, secs, json)| Self::decode_alarm(id, secs, &json))
            .transpose()
    }

    /// Pending alarms due at or before `now`, earliest first.
    pub fn due_alarms(
        &self,
        now: NaiveDateTime,
    ) -> Result<Vec<(ScheduledAlarmRecord, LaunchContext)>, HostError> {
        let mut stmt = self.conn.prepare(
            "SELECT alarm_id, fire_at, launch_json FROM alarm
             WHERE fired = 0 AND fire_at <= ?1
             ORDER BY fire_at ASC, alarm_id ASC",
        )?;
        let rows = stmt
            .query_map(params![to_secs(now)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, secs, json)| Self::decode_alarm(id, secs, &json))
            .collect()
    }

    /// Alarms that have not fired yet, earliest first.
    pub fn pending_alarms(&self) -> Result<Vec<ScheduledAlarmRecord>, HostError> {
        self.query_records(
            "SELECT alarm_id, fire_at FROM alarm
             WHERE fired = 0
             ORDER BY fire_at ASC, alarm_id ASC",
        )
    }

    /// Number of alarms still waiting to fire.
    pub fn alarm_count(&self) -> Result<i64, HostError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM alarm WHERE fired = 0", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_records(&self, sql: &str) -> Result<Vec<ScheduledAlarmRecord>, HostError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(alarm_id, secs)| {
                from_secs(secs)
                    .map(|fire_at| ScheduledAlarmRecord { alarm_id, fire_at })
                    .ok_or_else(|| HostError::Service {
                        code:    -1,
                        message: format!("alarm {alarm_id} has unreadable fire time {secs}"),
                    })
            })
            .collect()
    }

    fn decode_alarm(
        alarm_id: AlarmId,
        secs: i64,
        launch_json: &str,
    ) -> Result<(ScheduledAlarmRecord, LaunchContext), HostError> {
        let fire_at = from_secs(secs).ok_or_else(|| HostError::Service {
            code:    -1,
            message: format!("alarm {alarm_id} has unreadable fire time {secs}"),
        })?;
        let launch: LaunchContext = serde_json::from_str(launch_json)?;
        Ok((ScheduledAlarmRecord { alarm_id, fire_at }, launch))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_events(
        &self,
        logged_at: NaiveDateTime,
        events: &[ReminderEvent],
    ) -> Result<(), HostError> {
        for event in events {
            self.conn.execute(
                "INSERT INTO event_log (logged_at, event_type, payload) VALUES (?1, ?2, ?3)",
                params![
                    to_secs(logged_at),
                    event.type_name(),
                    serde_json::to_string(event)?,
                ],
            )?;
        }
        Ok(())
    }

    pub fn event_count(&self, event_type: &str) -> Result<i64, HostError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every logged event of one type, oldest first.
    pub fn events_of_type(&self, event_type: &str) -> Result<Vec<ReminderEvent>, HostError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM event_log WHERE event_type = ?1 ORDER BY id ASC",
        )?;
        let payloads = stmt
            .query_map(params![event_type], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(HostError::from))
            .collect()
    }
}

impl AlarmSink for HostStore {
    fn schedule_at(
        &mut self,
        fire_at: NaiveDateTime,
        launch: &LaunchContext,
    ) -> Result<AlarmId, HostError> {
        self.conn.execute(
            "INSERT INTO alarm (fire_at, launch_json) VALUES (?1, ?2)",
            params![to_secs(fire_at), serde_json::to_string(launch)?],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fired and pending alarms alike: a fired one-shot still belongs to its day.
    fn list_registered(&self) -> Result<Vec<ScheduledAlarmRecord>, HostError> {
        self.query_records("SELECT alarm_id, fire_at FROM alarm ORDER BY fire_at ASC, alarm_id ASC")
    }
}

impl KeyValueStore for HostStore {
    fn get_int(&self, key: &str) -> Result<Option<i64>, HostError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preference WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), HostError> {
        self.conn.execute(
            "INSERT INTO preference (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Wall-clock time as naive seconds. No zone is applied in either direction.
fn to_secs(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp()
}

fn from_secs(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|t| t.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn store() -> HostStore {
        let store = HostStore::in_memory().expect("in-memory store");
        store.migrate().expect("migration");
        store
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 4).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn scheduled_alarms_list_in_fire_order() {
        let mut store = store();
        let late = store.schedule_at(at(20, 0), &LaunchContext::alarm_launch()).unwrap();
        let early = store.schedule_at(at(9, 15), &LaunchContext::alarm_launch()).unwrap();

        let listed = store.list_registered().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], ScheduledAlarmRecord { alarm_id: early, fire_at: at(9, 15) });
        assert_eq!(listed[1].alarm_id, late);
    }

    #[test]
    fn due_alarms_and_cancel() {
        let mut store = store();
        let ctx = LaunchContext::alarm_launch().with_extra("k", "v");
        let id = store.schedule_at(at(9, 0), &ctx).unwrap();
        store.schedule_at(at(18, 0), &ctx).unwrap();

        let due = store.due_alarms(at(12, 0)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0.alarm_id, id);
        assert_eq!(due[0].1, ctx);

        assert!(store.cancel_alarm(id).unwrap());
        assert!(!store.cancel_alarm(id).unwrap());
        assert_eq!(store.alarm_count().unwrap(), 1);
        assert_eq!(store.next_alarm().unwrap().unwrap().0.fire_at, at(18, 0));
    }

    #[test]
    fn fired_alarms_stay_listed_but_leave_the_queue() {
        let mut store = store();
        let first = store.schedule_at(at(9, 0), &LaunchContext::alarm_launch()).unwrap();
        store.schedule_at(at(18, 0), &LaunchContext::alarm_launch()).unwrap();

        assert!(store.mark_fired(first).unwrap());
        assert!(!store.mark_fired(first).unwrap());

        assert_eq!(store.list_registered().unwrap().len(), 2);
        assert_eq!(store.alarm_count().unwrap(), 1);
        assert_eq!(store.pending_alarms().unwrap()[0].fire_at, at(18, 0));
        assert_eq!(store.next_alarm().unwrap().unwrap().0.fire_at, at(18, 0));
        assert!(store.due_alarms(at(12, 0)).unwrap().is_empty());
    }

    #[test]
    fn cancel_all_clears_fired_and_pending() {
        let mut store = store();
        let first = store.schedule_at(at(9, 0), &LaunchContext::alarm_launch()).unwrap();
        store.schedule_at(at(18, 0), &LaunchContext::alarm_launch()).unwrap();
        store.mark_fired(first).unwrap();

        assert_eq!(store.cancel_all().unwrap(), 2);
        assert!(store.list_registered().unwrap().is_empty());
        assert!(store.next_alarm().unwrap().is_none());
        assert_eq!(store.cancel_all().unwrap(), 0);
    }

    #[test]
    fn preferences_upsert() {
        let mut store = store();
        assert_eq!(store.get_int("num_reminders").unwrap(), None);
        store.set_int("num_reminders", 3).unwrap();
        store.set_int("num_reminders", 7).unwrap();
        assert_eq!(store.get_int("num_reminders").unwrap(), Some(7));
    }
}
