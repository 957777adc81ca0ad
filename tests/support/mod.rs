//! Shared fixtures for queue integration tests.

#![allow(dead_code)]

// std
use std::{collections::VecDeque, future::Future, pin::Pin, sync::Arc, time::Duration};
// crates.io
use parking_lot::Mutex;
use tokio::time::Instant;
// self
use request_queue::{
	QueueConfig, QueueEvent, QueueObserver, UpstreamError,
	event::{ErrorEvent, RetryEvent, SuccessEvent},
	timer::{SleepFuture, Timer, TokioTimer},
};

/// Boxed future produced by [`Journal::task`].
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, UpstreamError>> + Send>>;

/// Fast settings with deterministic backoff: 2 retries, 100ms base, 50ms spacing, no jitter.
pub fn quick_config() -> QueueConfig {
	QueueConfig::default()
		.with_max_retries(2)
		.with_base_delay_ms(100)
		.with_min_delay_between_requests_ms(50)
		.with_jitter_percent(0)
}

/// Records every `execute` invocation with its label and start instant.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<(String, Instant)>>>);
impl Journal {
	pub fn labels(&self) -> Vec<String> {
		self.0.lock().iter().map(|(label, _)| label.clone()).collect()
	}

	pub fn starts(&self) -> Vec<Instant> {
		self.0.lock().iter().map(|(_, at)| *at).collect()
	}

	pub fn attempts(&self) -> usize {
		self.0.lock().len()
	}

	/// Builds a task that fails with each status in `failures` (in order) and then returns
	/// `value` on every later attempt.
	pub fn task<T>(
		&self,
		label: &str,
		failures: &[u16],
		value: T,
	) -> impl 'static + Send + FnMut() -> TaskFuture<T> + use<T>
	where
		T: 'static + Send + Clone,
	{
		let journal = self.clone();
		let label = label.to_owned();
		let mut failures = failures.iter().copied().collect::<VecDeque<_>>();

		move || -> TaskFuture<T> {
			journal.0.lock().push((label.clone(), Instant::now()));

			let outcome = match failures.pop_front() {
				Some(status) =>
					Err(UpstreamError::with_status(status, format!("{label} failed with {status}"))),
				None => Ok(value.clone()),
			};

			Box::pin(async move { outcome })
		}
	}

	/// Builds a task that fails with `status` on every attempt.
	pub fn failing(
		&self,
		label: &str,
		status: u16,
	) -> impl 'static + Send + FnMut() -> TaskFuture<()> + use<> {
		self.task(label, &[status; 64], ())
	}
}

/// Observer that keeps every event it receives.
#[derive(Default)]
pub struct EventLog(Mutex<Vec<QueueEvent>>);
impl EventLog {
	pub fn events(&self) -> Vec<QueueEvent> {
		self.0.lock().clone()
	}

	pub fn successes(&self) -> Vec<SuccessEvent> {
		self.events()
			.into_iter()
			.filter_map(|event| match event {
				QueueEvent::Success(e) => Some(e),
				_ => None,
			})
			.collect()
	}

	pub fn retries(&self) -> Vec<RetryEvent> {
		self.events()
			.into_iter()
			.filter_map(|event| match event {
				QueueEvent::Retry(e) => Some(e),
				_ => None,
			})
			.collect()
	}

	pub fn errors(&self) -> Vec<ErrorEvent> {
		self.events()
			.into_iter()
			.filter_map(|event| match event {
				QueueEvent::Error(e) => Some(e),
				_ => None,
			})
			.collect()
	}
}
impl QueueObserver for EventLog {
	fn on_event(&self, event: &QueueEvent) {
		self.0.lock().push(event.clone());
	}
}

/// Tokio-backed timer that also records every requested sleep.
#[derive(Default)]
pub struct RecordingTimer(Mutex<Vec<Duration>>);
impl RecordingTimer {
	pub fn sleeps(&self) -> Vec<Duration> {
		self.0.lock().clone()
	}
}
impl Timer for RecordingTimer {
	fn now(&self) -> std::time::Instant {
		TokioTimer.now()
	}

	fn sleep(&self, duration: Duration) -> SleepFuture {
		self.0.lock().push(duration);

		TokioTimer.sleep(duration)
	}
}
