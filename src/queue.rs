//! Single-flight request queue with dispatch pacing and exponential backoff.
//!
//! [`RequestQueue::submit`] appends work to the tail of the queue and returns a [`Submission`]
//! that settles with the task's value or one terminal [`Error`]. A single drain task, spawned on
//! the current Tokio runtime whenever work arrives at an idle queue, pops tasks one at a time,
//! waits out the pacing floor, and invokes them. Transient failures (429 and 5xx) sleep for a
//! jittered exponential delay inside the drain task and are then re-inserted at the front, so a
//! retried task always runs before work that has not been attempted yet.

mod job;
mod metrics;

pub use metrics::QueueMetrics;

// std
use std::{
	collections::VecDeque,
	sync::atomic::{AtomicU64, Ordering},
	task::{Context, Poll},
	time::Instant,
};
// crates.io
use tokio::{runtime::Handle, sync::oneshot};
// self
use crate::{
	_prelude::*,
	backoff::Backoff,
	config::QueueConfig,
	error::UpstreamError,
	event::{ErrorEvent, QueueEvent, QueueObserver, RetryEvent, SuccessEvent},
	obs::{self, DispatchOutcome, DispatchSpan},
	queue::job::{Job, TypedJob},
	timer::{Timer, TokioTimer},
};

/// Serializes asynchronous work against a rate-limited dependency.
///
/// Cloning is cheap; clones share the same pending tasks, pacing state, and observers.
#[derive(Clone)]
pub struct RequestQueue {
	shared: Arc<Shared>,
}
impl RequestQueue {
	/// Creates a queue with the Tokio timer and no observers.
	pub fn new(config: QueueConfig) -> Self {
		Self::builder(config).build()
	}

	/// Starts a [`QueueBuilder`] for injecting observers or a custom timer.
	pub fn builder(config: QueueConfig) -> QueueBuilder {
		QueueBuilder::new(config)
	}

	/// Enqueues `execute` and returns a future for its eventual result.
	///
	/// The task is queued immediately, so submission order is dispatch order even if the returned
	/// [`Submission`] is polled later. `execute` is invoked once per attempt and must therefore be
	/// safe to call again after a transient failure. Dropping the [`Submission`] before the task
	/// is dispatched removes it from consideration.
	pub fn submit<F, Fut, T>(&self, execute: F) -> Submission<T>
	where
		F: 'static + Send + FnMut() -> Fut,
		Fut: 'static + Send + Future<Output = Result<T, UpstreamError>>,
		T: 'static + Send,
	{
		let (reply, rx) = oneshot::channel();
		let mut job = TypedJob::new(execute, reply);
		let Ok(runtime) = Handle::try_current() else {
			job.reject(Error::NoRuntime);

			return Submission { rx };
		};
		let id = self.shared.next_task_id.fetch_add(1, Ordering::Relaxed);
		let start = {
			let mut state = self.shared.state.lock();

			state.pending.push_back(QueuedTask { id, retry_count: 0, job: Box::new(job) });

			!std::mem::replace(&mut state.processing, true)
		};

		if start {
			runtime.spawn(Shared::drain(self.shared.clone()));
		}

		Submission { rx }
	}

	/// Number of tasks waiting to be dispatched (excluding the one in flight).
	pub fn len(&self) -> usize {
		self.shared.state.lock().pending.len()
	}

	/// Whether no task is waiting to be dispatched.
	pub fn is_empty(&self) -> bool {
		self.shared.state.lock().pending.is_empty()
	}

	/// Whether the drain task is currently running.
	pub fn is_processing(&self) -> bool {
		self.shared.state.lock().processing
	}

	/// Configuration the queue was built with.
	pub fn config(&self) -> &QueueConfig {
		&self.shared.config
	}

	/// Dispatch counters.
	pub fn metrics(&self) -> &QueueMetrics {
		&self.shared.metrics
	}
}
impl Debug for RequestQueue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.shared.state.lock();

		f.debug_struct("RequestQueue")
			.field("config", &self.shared.config)
			.field("pending", &state.pending.len())
			.field("processing", &state.processing)
			.field("observers", &self.shared.observers.len())
			.finish()
	}
}

/// Builder for [`RequestQueue`].
pub struct QueueBuilder {
	config: QueueConfig,
	timer: Arc<dyn Timer>,
	observers: Vec<Arc<dyn QueueObserver>>,
}
impl QueueBuilder {
	/// Starts from `config`, the Tokio timer, and no observers.
	pub fn new(config: QueueConfig) -> Self {
		Self { config, timer: Arc::new(TokioTimer), observers: Vec::new() }
	}

	/// Replaces the clock/sleep source.
	pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
		self.timer = timer;

		self
	}

	/// Adds an observer.
	pub fn observer(self, observer: impl 'static + QueueObserver) -> Self {
		self.shared_observer(Arc::new(observer))
	}

	/// Adds an observer the caller keeps a handle to.
	pub fn shared_observer(mut self, observer: Arc<dyn QueueObserver>) -> Self {
		self.observers.push(observer);

		self
	}

	/// Finishes the queue.
	pub fn build(self) -> RequestQueue {
		let backoff = self.config.backoff();

		RequestQueue {
			shared: Arc::new(Shared {
				config: self.config,
				backoff,
				timer: self.timer,
				observers: self.observers,
				metrics: QueueMetrics::default(),
				next_task_id: AtomicU64::new(1),
				state: Mutex::new(State::default()),
			}),
		}
	}
}
impl Debug for QueueBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QueueBuilder")
			.field("config", &self.config)
			.field("observers", &self.observers.len())
			.finish()
	}
}

/// Future returned by [`RequestQueue::submit`].
///
/// Resolves to the task's value, its terminal error, or [`Error::Abandoned`] if the queue dropped
/// the task without settling it.
#[must_use = "dropping a submission abandons the queued task"]
pub struct Submission<T> {
	rx: oneshot::Receiver<Result<T>>,
}
impl<T> Future for Submission<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|settled| settled.unwrap_or_else(|_| Err(Error::Abandoned)))
	}
}
impl<T> Debug for Submission<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Submission(..)")
	}
}

struct QueuedTask {
	id: u64,
	retry_count: u32,
	job: Box<dyn Job>,
}

#[derive(Default)]
struct State {
	pending: VecDeque<QueuedTask>,
	processing: bool,
	last_dispatch: Option<Instant>,
}

struct Shared {
	config: QueueConfig,
	backoff: Backoff,
	timer: Arc<dyn Timer>,
	observers: Vec<Arc<dyn QueueObserver>>,
	metrics: QueueMetrics,
	next_task_id: AtomicU64,
	state: Mutex<State>,
}
impl Shared {
	async fn drain(self: Arc<Self>) {
		let mut guard = DrainGuard { shared: self.clone(), finished: false };

		while let Some(task) = self.next_task() {
			self.dispatch(task).await;
		}

		guard.finished = true;
	}

	/// Pops the head of the queue, or leaves the processing state when it is empty.
	fn next_task(&self) -> Option<QueuedTask> {
		let mut state = self.state.lock();
		let task = state.pending.pop_front();

		if task.is_none() {
			state.processing = false;
		}

		task
	}

	async fn dispatch(&self, mut task: QueuedTask) {
		if task.job.is_abandoned() {
			self.abandon(&task);

			return;
		}

		self.pace().await;

		if task.job.is_abandoned() {
			self.abandon(&task);

			return;
		}

		let attempt = task.retry_count + 1;

		self.metrics.record_attempt();

		let outcome = DispatchSpan::new(task.id, attempt).instrument(task.job.run()).await;
		let error = match outcome {
			Ok(()) => {
				let queue_length = self.state.lock().pending.len();

				self.metrics.record_success();
				obs::record_dispatch_outcome(DispatchOutcome::Success);
				obs::trace_success(task.id, queue_length);
				self.emit(QueueEvent::Success(SuccessEvent {
					task_id: task.id,
					queue_length,
					timestamp: OffsetDateTime::now_utc(),
				}));

				return;
			},
			Err(error) => error,
		};

		if !error.kind().is_retryable() || task.retry_count >= self.config.max_retries {
			self.fail(task, error, attempt);

			return;
		}
		if task.job.is_abandoned() {
			self.abandon(&task);

			return;
		}

		let delay = self.backoff.jittered(task.retry_count);

		task.retry_count += 1;
		self.metrics.record_retry();
		obs::record_dispatch_outcome(DispatchOutcome::Retry);
		obs::trace_retry(task.id, &error, task.retry_count, delay);
		self.emit(QueueEvent::Retry(RetryEvent {
			task_id: task.id,
			error,
			retry_count: task.retry_count,
			delay,
			timestamp: OffsetDateTime::now_utc(),
		}));
		self.timer.sleep(delay).await;
		self.state.lock().pending.push_front(task);
	}

	/// Sleeps until the pacing floor since the previous dispatch has elapsed, then stamps the
	/// dispatch time.
	async fn pace(&self) {
		let floor = self.config.min_delay_between_requests();
		let last = self.state.lock().last_dispatch;

		if let Some(last) = last {
			let wait = floor.saturating_sub(self.timer.now().saturating_duration_since(last));

			if !wait.is_zero() {
				self.timer.sleep(wait).await;
			}
		}

		self.state.lock().last_dispatch = Some(self.timer.now());
	}

	fn fail(&self, mut task: QueuedTask, error: UpstreamError, attempts: u32) {
		self.metrics.record_failure();
		obs::record_dispatch_outcome(DispatchOutcome::Failure);
		obs::trace_failure(task.id, &error, attempts);
		task.job.reject(Error::settle(error.clone(), attempts));
		self.emit(QueueEvent::Error(ErrorEvent {
			task_id: task.id,
			error,
			attempts,
			timestamp: OffsetDateTime::now_utc(),
		}));
	}

	fn abandon(&self, task: &QueuedTask) {
		self.metrics.record_abandoned();
		obs::record_dispatch_outcome(DispatchOutcome::Abandoned);
		obs::trace_abandoned(task.id);
	}

	fn emit(&self, event: QueueEvent) {
		for observer in &self.observers {
			observer.on_event(&event);
		}
	}
}

/// Keeps the queue draining if the drain task is torn down early (a panicking task or a runtime
/// shutdown). Remaining work is handed to a fresh drain task; without a runtime it is rejected.
struct DrainGuard {
	shared: Arc<Shared>,
	finished: bool,
}
impl Drop for DrainGuard {
	fn drop(&mut self) {
		if self.finished {
			return;
		}

		let stranded = {
			let mut state = self.shared.state.lock();

			if state.pending.is_empty() {
				state.processing = false;

				return;
			}
			if let Ok(runtime) = Handle::try_current() {
				runtime.spawn(Shared::drain(self.shared.clone()));

				return;
			}

			state.processing = false;

			std::mem::take(&mut state.pending)
		};

		for mut task in stranded {
			self.shared.abandon(&task);
			task.job.reject(Error::Abandoned);
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::time::Duration;
	// self
	use super::*;

	fn quick_config() -> QueueConfig {
		QueueConfig::default()
			.with_max_retries(2)
			.with_base_delay_ms(100)
			.with_min_delay_between_requests_ms(50)
			.with_jitter_percent(0)
	}

	#[tokio::test(start_paused = true)]
	async fn idle_queue_reports_empty_state() {
		let queue = RequestQueue::new(quick_config());

		assert!(queue.is_empty());
		assert!(!queue.is_processing());

		let value = queue.submit(|| async { Ok::<_, UpstreamError>("ok") }).await;

		assert_eq!(value.expect("Task should succeed."), "ok");
		assert_eq!(queue.metrics().attempts(), 1);
		assert_eq!(queue.metrics().successes(), 1);
		tokio::task::yield_now().await;
		assert!(!queue.is_processing());
	}

	#[test]
	fn submit_outside_runtime_settles_with_no_runtime() {
		let queue = RequestQueue::new(quick_config());
		let submission = queue.submit(|| async { Ok::<_, UpstreamError>(()) });
		let runtime = tokio::runtime::Builder::new_current_thread()
			.build()
			.expect("Failed to build test runtime.");

		assert!(matches!(runtime.block_on(submission), Err(Error::NoRuntime)));
		assert!(queue.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_submission_is_skipped() {
		let queue = RequestQueue::new(quick_config());
		let calls = Arc::new(AtomicU64::new(0));
		let first = {
			let calls = calls.clone();

			queue.submit(move || {
				let calls = calls.clone();

				async move {
					calls.fetch_add(1, Ordering::Relaxed);
					tokio::time::sleep(Duration::from_millis(10)).await;

					Ok::<_, UpstreamError>(())
				}
			})
		};
		let second = {
			let calls = calls.clone();

			queue.submit(move || {
				let calls = calls.clone();

				async move {
					calls.fetch_add(1, Ordering::Relaxed);

					Ok::<_, UpstreamError>(())
				}
			})
		};

		drop(second);
		first.await.expect("First task should succeed.");
		tokio::time::sleep(Duration::from_millis(200)).await;

		assert_eq!(calls.load(Ordering::Relaxed), 1);
		assert_eq!(queue.metrics().abandoned(), 1);
		assert!(!queue.is_processing());
	}

	#[tokio::test(start_paused = true)]
	async fn panicking_task_releases_processing_flag() {
		let queue = RequestQueue::new(quick_config());
		let boom = queue.submit(|| async {
			if true {
				panic!("task exploded");
			}

			Ok::<_, UpstreamError>(())
		});

		assert!(matches!(boom.await, Err(Error::Abandoned)));
		tokio::task::yield_now().await;
		assert!(!queue.is_processing());

		let value = queue.submit(|| async { Ok::<_, UpstreamError>(5) }).await;

		assert_eq!(value.expect("Queue should recover after a panic."), 5);
	}

	#[tokio::test(start_paused = true)]
	async fn task_queued_behind_a_panic_still_settles() {
		let queue = RequestQueue::new(quick_config());
		let boom = queue.submit(|| async {
			if true {
				panic!("task exploded");
			}

			Ok::<_, UpstreamError>(())
		});
		let after = queue.submit(|| async { Ok::<_, UpstreamError>(7) });

		assert!(matches!(boom.await, Err(Error::Abandoned)));

		let value = tokio::time::timeout(Duration::from_secs(60), after)
			.await
			.expect("Queued task should settle without another submit.");

		assert_eq!(value.expect("Queued task should succeed."), 7);
		tokio::task::yield_now().await;
		assert!(queue.is_empty());
		assert!(!queue.is_processing());
	}

	#[tokio::test(start_paused = true)]
	async fn submission_dropped_during_pacing_wait_is_skipped() {
		let queue = RequestQueue::new(quick_config().with_min_delay_between_requests_ms(1_000));
		let calls = Arc::new(AtomicU64::new(0));
		let counted = |calls: Arc<AtomicU64>| {
			move || {
				let calls = calls.clone();

				async move {
					calls.fetch_add(1, Ordering::Relaxed);

					Ok::<_, UpstreamError>(())
				}
			}
		};

		queue.submit(counted(calls.clone())).await.expect("First task should succeed.");

		let second = queue.submit(counted(calls.clone()));

		tokio::time::sleep(Duration::from_millis(100)).await;
		drop(second);
		tokio::time::sleep(Duration::from_secs(2)).await;

		assert_eq!(calls.load(Ordering::Relaxed), 1);
		assert_eq!(queue.metrics().attempts(), 1);
		assert_eq!(queue.metrics().abandoned(), 1);
		assert!(!queue.is_processing());
	}
}
