// self
use crate::obs::DispatchOutcome;

/// Records a dispatch outcome via the global metrics recorder (when enabled).
pub fn record_dispatch_outcome(outcome: DispatchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("request_queue_dispatch_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_dispatch_outcome_noop_without_metrics() {
		record_dispatch_outcome(DispatchOutcome::Retry);
	}
}
