//! Exponential backoff with bounded additive jitter.

// std
use std::time::Duration;
// crates.io
use rand::Rng;

/// Backoff policy: `base * 2^retry`, plus up to `jitter_percent` of that, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
	base_ms: u64,
	max_ms: u64,
	jitter_percent: u8,
}
impl Backoff {
	/// Creates a policy from raw millisecond values.
	pub const fn new(base_ms: u64, max_ms: u64, jitter_percent: u8) -> Self {
		let jitter_percent = if jitter_percent > 100 { 100 } else { jitter_percent };

		Self { base_ms, max_ms, jitter_percent }
	}

	/// Delay before jitter for the given retry index (0 = first retry), capped.
	pub fn ceiling(&self, retry: u32) -> Duration {
		Duration::from_millis(self.exponential_ms(retry).min(self.max_ms))
	}

	/// Jittered delay drawn from `rng`.
	pub fn delay<R>(&self, retry: u32, rng: &mut R) -> Duration
	where
		R: Rng,
	{
		let exponential = self.exponential_ms(retry);
		let spread = exponential.saturating_mul(u64::from(self.jitter_percent)) / 100;
		let jitter = if spread == 0 { 0 } else { rng.random_range(0..=spread) };

		Duration::from_millis(exponential.saturating_add(jitter).min(self.max_ms))
	}

	/// Jittered delay drawn from the thread-local generator.
	pub fn jittered(&self, retry: u32) -> Duration {
		self.delay(retry, &mut rand::rng())
	}

	fn exponential_ms(&self, retry: u32) -> u64 {
		self.base_ms.saturating_mul(2_u64.saturating_pow(retry))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use rand::{SeedableRng, rngs::StdRng};
	// self
	use super::*;

	#[test]
	fn delays_double_within_jitter_bound() {
		let backoff = Backoff::new(1_000, 30_000, 30);
		let mut rng = StdRng::seed_from_u64(7);

		for retry in 0..4 {
			let floor = 1_000 * 2_u64.pow(retry);

			for _ in 0..64 {
				let delay = backoff.delay(retry, &mut rng).as_millis() as u64;

				assert!(delay >= floor, "retry {retry}: {delay} < {floor}");
				assert!(delay <= floor + floor * 30 / 100, "retry {retry}: {delay} above jitter");
			}
		}
	}

	#[test]
	fn delays_are_capped() {
		let backoff = Backoff::new(2_000, 30_000, 30);
		let mut rng = StdRng::seed_from_u64(11);

		assert_eq!(backoff.ceiling(4), Duration::from_millis(30_000));
		assert_eq!(backoff.ceiling(63), Duration::from_millis(30_000));

		for retry in [4, 10, 40, u32::MAX] {
			assert!(backoff.delay(retry, &mut rng) <= Duration::from_millis(30_000));
		}
	}

	#[test]
	fn zero_jitter_is_deterministic() {
		let backoff = Backoff::new(100, 30_000, 0);

		assert_eq!(backoff.jittered(0), Duration::from_millis(100));
		assert_eq!(backoff.jittered(1), Duration::from_millis(200));
		assert_eq!(backoff.jittered(3), Duration::from_millis(800));
	}
}
