// std
use std::time::Duration;
// self
use crate::{_prelude::*, error::UpstreamError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedDispatch<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedDispatch<F> = F;

/// Span wrapping a single dispatch of a queued task.
#[derive(Clone, Debug)]
pub struct DispatchSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl DispatchSpan {
	/// Creates a new span tagged with the task identifier and 1-based attempt number.
	pub fn new(task_id: u64, attempt: u32) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!("request_queue.dispatch", task_id, attempt);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (task_id, attempt);

			Self {}
		}
	}

	/// Instruments the task future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedDispatch<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a successful dispatch.
pub fn trace_success(task_id: u64, queue_length: usize) {
	#[cfg(feature = "tracing")]
	tracing::debug!(task_id, queue_length, "request succeeded");
	#[cfg(not(feature = "tracing"))]
	let _ = (task_id, queue_length);
}

/// Logs a transient failure that will be retried after `delay`.
pub fn trace_retry(task_id: u64, error: &UpstreamError, retry_count: u32, delay: Duration) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		task_id,
		status = error.status,
		code = error.code.as_deref(),
		retry_count,
		delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
		"retrying request: {error}"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (task_id, error, retry_count, delay);
}

/// Logs a terminal failure.
pub fn trace_failure(task_id: u64, error: &UpstreamError, attempts: u32) {
	#[cfg(feature = "tracing")]
	tracing::error!(
		task_id,
		status = error.status,
		code = error.code.as_deref(),
		kind = error.kind().as_str(),
		attempts,
		"request failed: {error}"
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (task_id, error, attempts);
}

/// Logs a task skipped because its caller went away.
pub fn trace_abandoned(task_id: u64) {
	#[cfg(feature = "tracing")]
	tracing::debug!(task_id, "skipping abandoned request");
	#[cfg(not(feature = "tracing"))]
	let _ = task_id;
}
