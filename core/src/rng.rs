//! Random number generation for reminder times.
//!
//! RULE: Nothing in the core calls a platform RNG directly.
//! All randomness flows through a RandomSource, so tests can pin
//! the stream (or replace it outright) and assert on bounds.
//!
//! Production seeds once per run from the wall clock. Reminders need a
//! believable spread across the day, not unpredictability.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;
use std::time::{SystemTime, UNIX_EPOCH};

/// Anything that can hand out uniform integers.
pub trait RandomSource {
    /// Uniform draw in [0, n). `n` must be > 0.
    fn next_u64_below(&mut self, n: u64) -> u64;
}

/// The default source: a PCG stream seeded once.
pub struct ReminderRng {
    seed:  u64,
    inner: Pcg64Mcg,
}

impl ReminderRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Seed from the current wall-clock time.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::seeded(nanos)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }
}

impl RandomSource for ReminderRng {
    fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        // Reject the tail that would bias the modulo.
        let zone = u64::MAX - (u64::MAX % n);
        loop {
            let v = self.inner.next_u64();
            if v < zone {
                return v % n;
            }
        }
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_u64_below(&mut self, n: u64) -> u64 {
        (**self).next_u64_below(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = ReminderRng::seeded(0xDEAD_BEEF);
        let mut b = ReminderRng::seeded(0xDEAD_BEEF);
        for _ in 0..64 {
            assert_eq!(a.next_u64_below(50_400), b.next_u64_below(50_400));
        }
    }

    #[test]
    fn draws_stay_below_bound() {
        let mut rng = ReminderRng::seeded(7);
        for n in [1u64, 2, 3, 60, 50_400, u64::MAX] {
            for _ in 0..1_000 {
                assert!(rng.next_u64_below(n) < n);
            }
        }
    }

    #[test]
    #[should_panic(expected = "n must be > 0")]
    fn zero_bound_is_a_bug() {
        ReminderRng::seeded(1).next_u64_below(0);
    }
}
