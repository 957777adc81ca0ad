//! Clock and sleep abstraction used by the drain loop for pacing and backoff.

// std
use std::time::{Duration, Instant};
// self
use crate::_prelude::*;

/// Boxed future returned by [`Timer::sleep`].
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Source of "now" and of delays.
///
/// Implementations must agree with themselves: an instant observed after `sleep(d)` resolves is
/// at least `d` later than one observed before it.
pub trait Timer
where
	Self: Send + Sync,
{
	/// Current instant.
	fn now(&self) -> Instant;

	/// Suspends for `duration`.
	fn sleep(&self, duration: Duration) -> SleepFuture;
}

/// Default timer backed by `tokio::time`, so a paused Tokio clock also pauses the queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioTimer;
impl Timer for TokioTimer {
	fn now(&self) -> Instant {
		tokio::time::Instant::now().into_std()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture {
		Box::pin(tokio::time::sleep(duration))
	}
}
