//! Optional observability helpers for the drain loop.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run each dispatch inside a `request_queue.dispatch` span carrying the
//!   `task_id` and `attempt` fields, and to log retries and terminal failures.
//! - Enable `metrics` to increment the `request_queue_dispatch_total` counter for every dispatch
//!   outcome, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
	/// The task resolved.
	Success,
	/// The task failed transiently and was put back at the front of the queue.
	Retry,
	/// The task failed terminally.
	Failure,
	/// The caller dropped its submission before the task was dispatched.
	Abandoned,
}
impl DispatchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchOutcome::Success => "success",
			DispatchOutcome::Retry => "retry",
			DispatchOutcome::Failure => "failure",
			DispatchOutcome::Abandoned => "abandoned",
		}
	}
}
impl Display for DispatchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
