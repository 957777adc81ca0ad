// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for queue dispatches.
#[derive(Debug, Default)]
pub struct QueueMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	retries: AtomicU64,
	failure: AtomicU64,
	abandoned: AtomicU64,
}
impl QueueMetrics {
	/// Returns the total number of `execute` invocations.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of tasks that resolved.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of retries scheduled.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of tasks that failed terminally.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of tasks skipped because their caller went away.
	pub fn abandoned(&self) -> u64 {
		self.abandoned.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_abandoned(&self) {
		self.abandoned.fetch_add(1, Ordering::Relaxed);
	}
}
