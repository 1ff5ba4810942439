//! Random reminder times inside the daily window.
//!
//! A draw resolves the window bounds on the given day to absolute
//! instants in the host zone, picks a uniform second in [start, end)
//! and converts back to local wall-clock time. Working in instants
//! keeps DST days honest: a 23-hour day simply has fewer seconds.
//!
//! RULE: Draws for today land strictly after "now". The engine trims the
//! range before drawing, see DrawRange::after. An alarm that fires and
//! triggers a refill therefore always moves time forward.

use crate::{
    config::TimeWindow,
    error::{ReminderError, ReminderResult},
    rng::RandomSource,
    types::CalendarDay,
};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone};

/// Longest DST gap we step over when a bound lands inside one.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// One uniformly distributed fire time on `day`, inside `window`.
pub fn generate_time<Tz, R>(
    day: CalendarDay,
    window: &TimeWindow,
    tz: &Tz,
    rng: &mut R,
) -> ReminderResult<NaiveDateTime>
where
    Tz: TimeZone,
    R: RandomSource + ?Sized,
{
    Ok(DrawRange::resolve(day, window, tz)?.draw(rng))
}

/// `count` independent draws. Duplicates are allowed.
pub fn generate_times<Tz, R>(
    day: CalendarDay,
    count: u32,
    window: &TimeWindow,
    tz: &Tz,
    rng: &mut R,
) -> ReminderResult<Vec<NaiveDateTime>>
where
    Tz: TimeZone,
    R: RandomSource + ?Sized,
{
    Ok(DrawRange::resolve(day, window, tz)?.draw_many(count, rng))
}

/// The window on one day, as the instants [start, start + span).
#[derive(Debug, Clone)]
pub struct DrawRange<Tz: TimeZone> {
    start_at: DateTime<Tz>,
    span:     u64,
}

impl<Tz: TimeZone> DrawRange<Tz> {
    pub fn resolve(day: CalendarDay, window: &TimeWindow, tz: &Tz) -> ReminderResult<Self> {
        let invalid = || ReminderError::InvalidWindow { window: *window };
        let (start, end) = window.validate()?;
        let start_local = day.date().and_time(start);
        let end_local = day.date().and_time(end);

        let start_at = resolve_local(tz, start_local, Bound::Start).ok_or_else(invalid)?;
        let end_at = resolve_local(tz, end_local, Bound::End).ok_or_else(invalid)?;

        let (start_at, end_at) = if end_at > start_at {
            (start_at, end_at)
        } else {
            // Both bounds in one repeated hour: keep to its first pass.
            match (
                tz.from_local_datetime(&start_local).earliest(),
                tz.from_local_datetime(&end_local).earliest(),
            ) {
                (Some(s), Some(e)) if e > s => (s, e),
                // The whole window vanished into a DST gap.
                _ => return Err(invalid()),
            }
        };

        let span = (end_at.timestamp() - start_at.timestamp()) as u64;
        Ok(Self { start_at, span })
    }

    /// The part of the range strictly after `instant`. None once nothing is left.
    pub fn after(self, instant: &DateTime<Tz>) -> Option<Self> {
        let skip = instant.timestamp() + 1 - self.start_at.timestamp();
        if skip <= 0 {
            return Some(self);
        }
        let skip = skip as u64;
        if skip >= self.span {
            return None;
        }
        Some(Self {
            start_at: self.start_at + Duration::seconds(skip as i64),
            span:     self.span - skip,
        })
    }

    pub fn span_secs(&self) -> u64 {
        self.span
    }

    pub fn draw<R: RandomSource + ?Sized>(&self, rng: &mut R) -> NaiveDateTime {
        let offset = rng.next_u64_below(self.span) as i64;
        (self.start_at.clone() + Duration::seconds(offset)).naive_local()
    }

    pub fn draw_many<R: RandomSource + ?Sized>(&self, count: u32, rng: &mut R) -> Vec<NaiveDateTime> {
        (0..count).map(|_| self.draw(rng)).collect()
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Local wall-clock time to an instant. Skipped times move to the first
/// instant after the gap. Ambiguous times pick the occurrence that keeps
/// every instant of the range inside the window on the wall clock: the
/// later one for a start, the earlier one for an end.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime, bound: Bound) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(early, late) => match bound {
            Bound::Start => Some(late),
            Bound::End => Some(early),
        },
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|m| tz.from_local_datetime(&(local + Duration::minutes(m))).earliest()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ReminderRng;
    use chrono::{FixedOffset, NaiveTime, TimeZone, Utc};

    /// Always draws the largest allowed value.
    struct MaxSource;

    impl RandomSource for MaxSource {
        fn next_u64_below(&mut self, n: u64) -> u64 {
            n - 1
        }
    }

    /// Always draws zero.
    struct MinSource;

    impl RandomSource for MinSource {
        fn next_u64_below(&mut self, _n: u64) -> u64 {
            0
        }
    }

    fn day() -> CalendarDay {
        CalendarDay::from_ymd(2024, 6, 15).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(8, 0, 22, 0)
    }

    #[test]
    fn extreme_draws_hit_the_closed_open_bounds() {
        let low = generate_time(day(), &window(), &Utc, &mut MinSource).unwrap();
        let high = generate_time(day(), &window(), &Utc, &mut MaxSource).unwrap();

        assert_eq!(low.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(high.time(), NaiveTime::from_hms_opt(21, 59, 59).unwrap());
        assert_eq!(CalendarDay::of(&high), day());
    }

    #[test]
    fn offset_zone_keeps_wall_clock_bounds() {
        let tz = FixedOffset::east_opt(-5 * 3600).unwrap();
        let mut rng = ReminderRng::seeded(99);
        for t in generate_times(day(), 500, &window(), &tz, &mut rng).unwrap() {
            assert_eq!(CalendarDay::of(&t), day());
            assert!(t.time() >= NaiveTime::from_hms_opt(8, 0, 0).unwrap());
            assert!(t.time() < NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        }
    }

    #[test]
    fn after_trims_the_elapsed_part() {
        let range = DrawRange::resolve(day(), &window(), &Utc).unwrap();
        let noon = Utc.from_utc_datetime(&day().date().and_hms_opt(12, 0, 0).unwrap());
        let last = Utc.from_utc_datetime(&day().date().and_hms_opt(21, 59, 59).unwrap());
        let early = Utc.from_utc_datetime(&day().date().and_hms_opt(6, 0, 0).unwrap());

        let rest = range.clone().after(&noon).unwrap();
        assert_eq!(rest.span_secs(), 10 * 3600 - 1);
        assert_eq!(rest.draw(&mut MinSource).time(), NaiveTime::from_hms_opt(12, 0, 1).unwrap());
        assert_eq!(rest.draw(&mut MaxSource).time(), NaiveTime::from_hms_opt(21, 59, 59).unwrap());
        assert_eq!(range.clone().after(&early).unwrap().span_secs(), 14 * 3600);
        assert!(range.after(&last).is_none());
    }

    #[test]
    fn zero_count_still_validates_the_window() {
        let mut rng = ReminderRng::seeded(1);
        assert!(generate_times(day(), 0, &window(), &Utc, &mut rng).unwrap().is_empty());

        let empty = TimeWindow::new(10, 0, 10, 0);
        let err = generate_times(day(), 0, &empty, &Utc, &mut rng).unwrap_err();
        assert!(matches!(err, ReminderError::InvalidWindow { .. }));
    }
}
