//! The reconciliation engine: the heart of the reminder core.
//!
//! One pass (`update_alarms`) looks at exactly two days:
//!   1. Tomorrow  (provisioning ahead of time comes first)
//!   2. Today
//!
//! For each day: read the target fresh, validate the window, count what
//! the alarm service already has, and schedule only the shortfall at
//! random times in what is left of that day's window.
//!
//! RULES:
//!   - A pass only ever adds alarms. Excess is logged, never cancelled.
//!   - No count, no scheduling: a bad window or failed listing skips the day.
//!   - Nothing is scheduled at or before "now". Once today's window has
//!     closed, today's shortfall is recorded and dropped.
//!   - One failed schedule request never stops its siblings.
//!   - No state survives between passes; the alarm service is the only
//!     source of truth. Running a pass twice in a row is a no-op the
//!     second time.
//!   - Alarms that already fired still count toward their day, so a pass
//!     run from an alarm fire never tops today up again.
//!
//! Passes run to completion on the caller's thread. Hosts that can deliver
//! two launch events at once must serialize calls; `&mut self` already
//! enforces that within one process.

use crate::{
    clock::Clock,
    config::{PolicyDefaults, ReminderPolicy},
    error::{ReconcileError, ReminderError},
    event::ReminderEvent,
    generator::DrawRange,
    host::{AlarmSink, KeyValueStore},
    inventory::AlarmInventory,
    rng::{RandomSource, ReminderRng},
    types::{CalendarDay, LaunchContext, ReconciliationRequest, ScheduledAlarmRecord},
};
use chrono::DateTime;
use serde::Serialize;
use std::cmp::Ordering;

/// What a pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub events:    Vec<ReminderEvent>,
    pub scheduled: Vec<ScheduledAlarmRecord>,
}

impl ReconcileReport {
    pub fn scheduled_on(&self, day: CalendarDay) -> usize {
        self.scheduled.iter().filter(|r| r.day() == day).count()
    }
}

pub struct ReminderEngine<S, K, C, R = ReminderRng> {
    alarms:   S,
    prefs:    K,
    clock:    C,
    rng:      R,
    defaults: PolicyDefaults,
}

impl<S, K, C, R> ReminderEngine<S, K, C, R>
where
    S: AlarmSink,
    K: KeyValueStore,
    C: Clock,
    R: RandomSource,
{
    pub fn new(alarms: S, prefs: K, clock: C, rng: R) -> Self {
        Self {
            alarms,
            prefs,
            clock,
            rng,
            defaults: PolicyDefaults::default(),
        }
    }

    /// Replace the built-in policy fallbacks.
    pub fn with_defaults(mut self, defaults: PolicyDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn policy(&self) -> ReminderPolicy<'_, K> {
        ReminderPolicy::new(&self.prefs, self.defaults)
    }

    pub fn inventory(&self) -> AlarmInventory<'_, S> {
        AlarmInventory::new(&self.alarms)
    }

    /// Make sure today and tomorrow each have the target number of alarms.
    ///
    /// `launch` is registered with every new alarm so the host can route
    /// the fire event back into the app.
    pub fn update_alarms(
        &mut self,
        launch: &LaunchContext,
    ) -> Result<ReconcileReport, ReconcileError> {
        let now = self.clock.now();
        let now_local = now.naive_local();
        let today = CalendarDay::of(&now_local);

        log::info!("Updating alarms at {now_local}");

        let mut report = ReconcileReport::default();
        let mut failures = Vec::new();
        report.events.push(ReminderEvent::PassStarted { now: now_local });

        match today.succ() {
            Some(tomorrow) => {
                self.reconcile_day(tomorrow, launch, &now, &mut report, &mut failures)
            }
            None => failures.push(ReminderError::DayOutOfRange { day: today }),
        }
        self.reconcile_day(today, launch, &now, &mut report, &mut failures);

        log::debug!(
            "pass done: {} scheduled, {} failure(s)",
            report.scheduled.len(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ReconcileError { failures, report })
        }
    }

    fn reconcile_day(
        &mut self,
        day: CalendarDay,
        launch: &LaunchContext,
        now: &DateTime<C::Tz>,
        report: &mut ReconcileReport,
        failures: &mut Vec<ReminderError>,
    ) {
        let (target, window) = {
            let policy = self.policy();
            (policy.get_target_count(), policy.get_window())
        };
        let request = ReconciliationRequest { target_day: day, target_count: target };
        log::debug!("reconciling {request:?} in window {window}");

        let range = match DrawRange::resolve(day, &window, &now.timezone()) {
            Ok(range) => range,
            Err(e) => {
                Self::skip_day(day, e, report, failures);
                return;
            }
        };

        let existing = match self.inventory().count_for_day(day) {
            Ok(n) => n,
            Err(e) => {
                Self::skip_day(day, e, report, failures);
                return;
            }
        };

        match existing.cmp(&(target as usize)) {
            Ordering::Equal => {
                log::info!("Correct number of alarms scheduled for {day} ({existing}).");
                report.events.push(ReminderEvent::DaySatisfied { day, existing, target });
            }
            Ordering::Greater => {
                log::info!("{day} has {existing} alarms, more than the target {target}; leaving them.");
                report.events.push(ReminderEvent::ExcessIgnored { day, existing, target });
            }
            Ordering::Less => {
                let shortfall = target as usize - existing;
                log::info!("Wrong number of alarms scheduled for {day}, {existing} instead of {target}.");
                report.events.push(ReminderEvent::ShortfallDetected {
                    day,
                    existing,
                    target,
                    shortfall,
                });

                let Some(range) = range.after(now) else {
                    log::info!("Window {window} on {day} has already passed; nothing to schedule.");
                    report.events.push(ReminderEvent::WindowElapsed { day, shortfall });
                    return;
                };

                for fire_at in range.draw_many(shortfall as u32, &mut self.rng) {
                    match self.alarms.schedule_at(fire_at, launch) {
                        Ok(alarm_id) => {
                            log::info!("New alarm {alarm_id} scheduled at: {fire_at}");
                            report.events.push(ReminderEvent::AlarmScheduled { day, alarm_id, fire_at });
                            report.scheduled.push(ScheduledAlarmRecord { alarm_id, fire_at });
                        }
                        Err(source) => {
                            log::warn!("Scheduling alarm at {fire_at} failed: {source}");
                            report.events.push(ReminderEvent::ScheduleFailed {
                                day,
                                fire_at,
                                reason: source.to_string(),
                            });
                            failures.push(ReminderError::ScheduleFailed { day, time: fire_at, source });
                        }
                    }
                }
            }
        }
    }

    fn skip_day(
        day: CalendarDay,
        error: ReminderError,
        report: &mut ReconcileReport,
        failures: &mut Vec<ReminderError>,
    ) {
        log::warn!("Skipping {day}: {error}");
        report.events.push(ReminderEvent::DaySkipped { day, reason: error.to_string() });
        failures.push(error);
    }
}

impl<S, K, C, R> ReminderEngine<S, K, C, R> {
    pub fn alarms(&self) -> &S {
        &self.alarms
    }

    pub fn alarms_mut(&mut self) -> &mut S {
        &mut self.alarms
    }

    pub fn prefs(&self) -> &K {
        &self.prefs
    }

    pub fn prefs_mut(&mut self) -> &mut K {
        &mut self.prefs
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn into_parts(self) -> (S, K, C, R) {
        (self.alarms, self.prefs, self.clock, self.rng)
    }
}
