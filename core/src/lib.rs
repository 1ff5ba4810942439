//! Reality-check reminders: keep exactly N randomly timed alarms per day.
//!
//! The core is the alarm reconciliation engine. It reads what the host's
//! alarm service already has for today and tomorrow and schedules only
//! the shortfall, so it is safe to run on every launch and every alarm fire.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod generator;
pub mod host;
pub mod inventory;
pub mod rng;
pub mod store;
pub mod trigger;
pub mod types;
