//! Queue configuration: retry budget, backoff growth, and dispatch pacing.

// std
use std::time::Duration;
// self
use crate::{_prelude::*, backoff::Backoff, error::ConfigError};

/// Tunables applied when a [`RequestQueue`](crate::queue::RequestQueue) is constructed.
///
/// Every field has a default, so partial JSON documents deserialize cleanly:
///
/// ```
/// use request_queue::config::QueueConfig;
///
/// let config = QueueConfig::from_json(r#"{ "maxRetries": 5 }"#).unwrap();
///
/// assert_eq!(config.max_retries, 5);
/// assert_eq!(config.base_delay_ms, 1_000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct QueueConfig {
	/// Retries allowed after the first attempt.
	pub max_retries: u32,
	/// Delay before the first retry; doubles on each subsequent retry.
	pub base_delay_ms: u64,
	/// Minimum spacing between two consecutive dispatches.
	pub min_delay_between_requests_ms: u64,
	/// Upper bound for a single backoff delay.
	pub max_delay_ms: u64,
	/// Jitter bound as a percentage of the exponential delay.
	pub jitter_percent: u8,
}
impl QueueConfig {
	const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
	const DEFAULT_JITTER_PERCENT: u8 = 30;
	const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
	const DEFAULT_MAX_RETRIES: u32 = 3;
	const DEFAULT_MIN_DELAY_MS: u64 = 500;

	/// Settings used in front of the production chat-completion provider: three retries starting
	/// at two seconds, with one second between requests.
	pub fn conservative() -> Self {
		Self::default().with_base_delay_ms(2_000).with_min_delay_between_requests_ms(1_000)
	}

	/// Parses a JSON document, reporting the offending field path on failure.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)?;

		de.end().map_err(|source| ConfigError::Malformed { path: ".".into(), source })?;
		config.validate()?;

		Ok(config)
	}

	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.jitter_percent > 100 {
			return Err(ConfigError::JitterOutOfRange(self.jitter_percent));
		}
		if self.max_delay_ms < self.base_delay_ms {
			return Err(ConfigError::CapBelowBase {
				base_delay_ms: self.base_delay_ms,
				max_delay_ms: self.max_delay_ms,
			});
		}

		Ok(())
	}

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the first backoff delay.
	pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
		self.base_delay_ms = base_delay_ms;

		self
	}

	/// Overrides the pacing floor.
	pub fn with_min_delay_between_requests_ms(mut self, min_delay_ms: u64) -> Self {
		self.min_delay_between_requests_ms = min_delay_ms;

		self
	}

	/// Overrides the backoff cap.
	pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
		self.max_delay_ms = max_delay_ms;

		self
	}

	/// Overrides the jitter bound (clamped to 100).
	pub fn with_jitter_percent(mut self, jitter_percent: u8) -> Self {
		self.jitter_percent = jitter_percent.min(100);

		self
	}

	/// Pacing floor as a [`Duration`].
	pub fn min_delay_between_requests(&self) -> Duration {
		Duration::from_millis(self.min_delay_between_requests_ms)
	}

	/// Backoff policy derived from this configuration.
	pub fn backoff(&self) -> Backoff {
		Backoff::new(self.base_delay_ms, self.max_delay_ms, self.jitter_percent)
	}
}
impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			base_delay_ms: Self::DEFAULT_BASE_DELAY_MS,
			min_delay_between_requests_ms: Self::DEFAULT_MIN_DELAY_MS,
			max_delay_ms: Self::DEFAULT_MAX_DELAY_MS,
			jitter_percent: Self::DEFAULT_JITTER_PERCENT,
		}
	}
}
