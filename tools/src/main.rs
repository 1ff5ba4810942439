//! rc-runner: headless reminder runner.
//!
//! Drives the reconciliation engine against the SQLite host store on a
//! simulated clock: one cold launch, then every alarm fires in order and
//! is delivered back as a launch event, exactly as a watch would do it.
//!
//! Usage:
//!   rc-runner --seed 12345 --days 7 --db reminders.db
//!   rc-runner --start 2024-06-01T07:00 --reminders 8 --window-start 09:00 --window-end 17:30
//!   rc-runner --policy policy.json --json
//!   rc-runner --db reminders.db --teardown

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Offset};
use reality_check_core::{
    clock::{Clock, SimulatedClock},
    config::{self, PolicyDefaults, TimeWindow},
    engine::ReminderEngine,
    error::HostError,
    host::{FireActuator, VibrationPattern},
    rng::ReminderRng,
    store::HostStore,
    trigger::{TriggerAdapter, TriggerOutcome},
    types::{CalendarDay, LaunchContext, APP_CONTROL_DATA_ALARM_ID, APP_CONTROL_OPERATION_MAIN},
};
use std::collections::BTreeMap;
use std::env;

/// Stands in for the watch's screen and vibration motor.
struct LoggingActuator;

impl FireActuator for LoggingActuator {
    fn wake_display(&mut self, hold_ms: u32) -> Result<(), HostError> {
        log::debug!("display on for {hold_ms} ms");
        Ok(())
    }

    fn vibrate(&mut self, pattern: &VibrationPattern) -> Result<(), HostError> {
        log::debug!(
            "vibrating {}x{} ms ({} ms total)",
            pattern.pulses,
            pattern.on_ms,
            pattern.total_ms()
        );
        Ok(())
    }
}

#[derive(serde::Serialize)]
struct DaySummary {
    day:     CalendarDay,
    fired:   usize,
    pending: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", chrono_tick());
    let days = parse_arg(&args, "--days", 3i64);
    let json = args.iter().any(|a| a == "--json");
    let teardown = args.iter().any(|a| a == "--teardown");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let start = match str_arg(&args, "--start") {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
            .with_context(|| format!("--start must look like 2024-06-01T07:00, got {s}"))?,
        None => Local::now().date_naive().and_time(NaiveTime::MIN) + Duration::hours(7),
    };

    let defaults = match str_arg(&args, "--policy") {
        Some(path) => PolicyDefaults::load(path)?,
        None => PolicyDefaults::default(),
    };

    // For :memory: use SQLite shared-memory URI so the alarm registry,
    // preference store and event log all see the same database.
    let db_effective: String = if db == ":memory:" {
        format!("file:rcrun_{}?mode=memory&cache=shared", chrono_tick())
    } else {
        db.to_string()
    };
    let alarms = HostStore::open(&db_effective)?;
    alarms.migrate()?;
    let mut prefs = HostStore::open(&db_effective)?;
    let log_store = HostStore::open(&db_effective)?;

    if let Some(n) = str_arg(&args, "--reminders") {
        let n: u32 = n.parse().with_context(|| format!("--reminders must be a count, got {n}"))?;
        config::set_target_count(&mut prefs, n)?;
    }
    if let (Some(from), Some(to)) = (str_arg(&args, "--window-start"), str_arg(&args, "--window-end")) {
        let window = parse_window(from, to)?;
        config::set_window(&mut prefs, window)?;
    }

    let offset_secs = Local::now().offset().fix().local_minus_utc();
    let clock = SimulatedClock::at_local(start, offset_secs)
        .with_context(|| format!("{start} does not exist in the local zone"))?;

    if !json {
        println!("Reality check: rc-runner");
        println!("  seed:   {seed}");
        println!("  start:  {start}");
        println!("  days:   {days}");
        println!("  db:     {db}");
        println!();
    }

    let mut engine = ReminderEngine::new(alarms, prefs, clock, ReminderRng::seeded(seed))
        .with_defaults(defaults);
    let mut adapter = TriggerAdapter::new(LoggingActuator);

    // Cold launch.
    let outcome = adapter.on_app_control(&mut engine, &LaunchContext::new(APP_CONTROL_OPERATION_MAIN));
    record(&log_store, start, &outcome)?;

    let end = start + Duration::days(days);
    let mut fired: BTreeMap<CalendarDay, usize> = BTreeMap::new();

    while let Some((alarm, launch)) = engine.alarms().next_alarm()? {
        if alarm.fire_at >= end {
            break;
        }
        let now = engine.clock().now().naive_local();
        if alarm.fire_at > now {
            engine.clock_mut().advance(alarm.fire_at - now);
        }
        // One-shot: it leaves the queue but still counts for its day.
        engine.alarms().mark_fired(alarm.alarm_id)?;
        *fired.entry(alarm.day()).or_insert(0) += 1;

        if !json {
            println!("  ⏰ {}  (alarm {})", alarm.fire_at, alarm.alarm_id);
        }

        let launch = launch.with_extra(APP_CONTROL_DATA_ALARM_ID, alarm.alarm_id.to_string());
        let outcome = adapter.on_app_control(&mut engine, &launch);
        record(&log_store, alarm.fire_at, &outcome)?;
    }

    let mut pending: BTreeMap<CalendarDay, usize> = BTreeMap::new();
    for alarm in engine.alarms().pending_alarms()? {
        *pending.entry(alarm.day()).or_insert(0) += 1;
    }
    print_summary(&log_store, &fired, &pending, json)?;

    // App termination: the watch drops every reminder with it.
    if teardown {
        engine.alarms().cancel_all()?;
    }
    Ok(())
}

/// Persist what a launch did. Reconciliation failures are reported, not fatal:
/// the next launch retries.
fn record(log_store: &HostStore, at: NaiveDateTime, outcome: &TriggerOutcome) -> Result<()> {
    match &outcome.reconcile {
        Ok(report) => log_store.append_events(at, &report.events)?,
        Err(e) => {
            log::warn!("{e}");
            log_store.append_events(at, &e.report.events)?;
        }
    }
    if let Some(fired) = &outcome.fired {
        log_store.append_events(at, std::slice::from_ref(fired))?;
    }
    Ok(())
}

fn print_summary(
    log_store: &HostStore,
    fired: &BTreeMap<CalendarDay, usize>,
    pending: &BTreeMap<CalendarDay, usize>,
    json: bool,
) -> Result<()> {
    let mut days: Vec<CalendarDay> = fired.keys().chain(pending.keys()).copied().collect();
    days.sort();
    days.dedup();
    let summary: Vec<DaySummary> = days
        .into_iter()
        .map(|day| DaySummary {
            day,
            fired:   fired.get(&day).copied().unwrap_or(0),
            pending: pending.get(&day).copied().unwrap_or(0),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }

    println!();
    println!("=== RUN SUMMARY ===");
    for s in &summary {
        println!("  {} | fired: {:>3} | pending: {:>3}", s.day, s.fired, s.pending);
    }
    println!();
    println!("  alarms scheduled: {}", log_store.event_count("alarm_scheduled")?);
    println!("  schedule errors:  {}", log_store.event_count("schedule_failed")?);
    println!("  days skipped:     {}", log_store.event_count("day_skipped")?);
    println!("  windows elapsed:  {}", log_store.event_count("window_elapsed")?);
    Ok(())
}

fn parse_window(from: &str, to: &str) -> Result<TimeWindow> {
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("expected HH:MM, got {s}"))
    };
    use chrono::Timelike;
    let (from, to) = (parse(from)?, parse(to)?);
    Ok(TimeWindow::new(from.hour(), from.minute(), to.hour(), to.minute()))
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn chrono_tick() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
