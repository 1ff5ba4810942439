//! Wall clock: where "now" comes from.
//!
//! RULE: The engine never calls chrono::Local directly.
//! Everything that needs the current time asks a Clock, so tests and
//! the runner can drive time by hand.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, TimeZone};

pub trait Clock {
    /// Zone the host interprets alarm wall-clock times in.
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// The host's real local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to. Never goes backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedClock {
    current: DateTime<FixedOffset>,
}

impl SimulatedClock {
    pub fn at(current: DateTime<FixedOffset>) -> Self {
        Self { current }
    }

    /// Build from a local wall-clock time in a zone `offset_secs` east of UTC.
    /// Returns None for an out-of-range offset.
    pub fn at_local(local: NaiveDateTime, offset_secs: i32) -> Option<Self> {
        let tz = FixedOffset::east_opt(offset_secs)?;
        tz.from_local_datetime(&local).single().map(Self::at)
    }

    /// Jump to `to`. Earlier instants are ignored.
    pub fn set(&mut self, to: DateTime<FixedOffset>) {
        if to < self.current {
            log::warn!("clock: refusing to move back from {} to {to}", self.current);
            return;
        }
        self.current = to;
    }

    /// Move forward by `by`. Negative durations are ignored.
    pub fn advance(&mut self, by: Duration) {
        if by < Duration::zero() {
            log::warn!("clock: ignoring negative advance of {by}");
            return;
        }
        self.current += by;
    }
}

impl Clock for SimulatedClock {
    type Tz = FixedOffset;

    fn now(&self) -> DateTime<FixedOffset> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> SimulatedClock {
        let local = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(7, 30, 0).unwrap();
        SimulatedClock::at_local(local, 3600).unwrap()
    }

    #[test]
    fn advance_moves_forward_only() {
        let mut clock = start();
        let before = clock.now();

        clock.advance(Duration::hours(2));
        assert_eq!(clock.now() - before, Duration::hours(2));

        clock.advance(Duration::hours(-5));
        assert_eq!(clock.now() - before, Duration::hours(2));
    }

    #[test]
    fn set_ignores_earlier_instants() {
        let mut clock = start();
        let before = clock.now();

        clock.set(before - Duration::minutes(1));
        assert_eq!(clock.now(), before);

        clock.set(before + Duration::days(1));
        assert_eq!(clock.now(), before + Duration::days(1));
    }
}
