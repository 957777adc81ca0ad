//! Queue-level error types: the typed upstream failure produced by submitted work and the
//! terminal error handed back to callers.

// self
use crate::_prelude::*;

/// Queue-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Terminal error returned by [`Submission`](crate::queue::Submission).
#[derive(Debug, ThisError)]
pub enum Error {
	/// Upstream kept answering 429 until the retry budget ran out.
	#[error("Rate limit exceeded. Please try again later.")]
	RateLimitExceeded {
		/// Number of times the task was dispatched.
		attempts: u32,
		/// Last failure reported by the task.
		#[source]
		source: UpstreamError,
	},
	/// Upstream kept answering 5xx until the retry budget ran out.
	#[error("Server error. Please try again in a moment.")]
	ServerUnavailable {
		/// Number of times the task was dispatched.
		attempts: u32,
		/// Last failure reported by the task.
		#[source]
		source: UpstreamError,
	},
	/// Non-retryable upstream failure, passed through unchanged.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// The queue dropped the task before it settled.
	#[error("Request queue dropped the task before it settled.")]
	Abandoned,
	/// The task was submitted outside a Tokio runtime.
	#[error("Request queue requires a Tokio runtime to dispatch work.")]
	NoRuntime,
}
impl Error {
	/// Builds the caller-facing error for a failure that will not be retried.
	pub fn settle(source: UpstreamError, attempts: u32) -> Self {
		match source.kind() {
			ErrorKind::RateLimited => Self::RateLimitExceeded { attempts, source },
			ErrorKind::Server => Self::ServerUnavailable { attempts, source },
			ErrorKind::Client | ErrorKind::Unclassified => Self::Upstream(source),
		}
	}

	/// Returns the upstream failure behind this error, if any.
	pub fn upstream(&self) -> Option<&UpstreamError> {
		match self {
			Self::RateLimitExceeded { source, .. }
			| Self::ServerUnavailable { source, .. }
			| Self::Upstream(source) => Some(source),
			Self::Abandoned | Self::NoRuntime => None,
		}
	}

	/// HTTP status of the upstream failure, when one was reported.
	pub fn status(&self) -> Option<u16> {
		self.upstream().and_then(|e| e.status)
	}
}

/// Closed classification of upstream failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// HTTP 429.
	RateLimited,
	/// HTTP 5xx.
	Server,
	/// Any other HTTP 4xx.
	Client,
	/// No status, or a status that is not an error (transport failures, local bugs).
	Unclassified,
}
impl ErrorKind {
	/// Classifies an optional HTTP status code.
	pub const fn from_status(status: Option<u16>) -> Self {
		match status {
			Some(429) => Self::RateLimited,
			Some(code) if code >= 500 => Self::Server,
			Some(code) if code >= 400 => Self::Client,
			_ => Self::Unclassified,
		}
	}

	/// Whether the queue may retry failures of this kind.
	pub const fn is_retryable(self) -> bool {
		match self {
			Self::RateLimited | Self::Server => true,
			Self::Client | Self::Unclassified => false,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::RateLimited => "rate_limited",
			Self::Server => "server",
			Self::Client => "client",
			Self::Unclassified => "unclassified",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure reported by a submitted task.
///
/// The `status` field drives retry classification; `code` and `message` are carried through to
/// callers and observers untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct UpstreamError {
	/// HTTP status code returned by the upstream service, when available.
	pub status: Option<u16>,
	/// Provider- or transport-specific error code.
	pub code: Option<String>,
	/// Human-readable failure description.
	pub message: String,
}
impl UpstreamError {
	/// Creates an error without a status code.
	pub fn new(message: impl Into<String>) -> Self {
		Self { status: None, code: None, message: message.into() }
	}

	/// Creates an error carrying an HTTP status code.
	pub fn with_status(status: u16, message: impl Into<String>) -> Self {
		Self { status: Some(status), code: None, message: message.into() }
	}

	/// Attaches a provider error code.
	pub fn code(mut self, code: impl Into<String>) -> Self {
		self.code = Some(code.into());

		self
	}

	/// Classifies the failure by its status code.
	pub fn kind(&self) -> ErrorKind {
		ErrorKind::from_status(self.status)
	}
}

/// Failures raised while loading or validating a [`QueueConfig`](crate::config::QueueConfig).
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration JSON could not be parsed.
	#[error("Queue configuration is malformed at `{path}`.")]
	Malformed {
		/// Path of the offending field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Jitter must stay within 0..=100 percent.
	#[error("Jitter percent must be at most 100, got {0}.")]
	JitterOutOfRange(u8),
	/// Backoff cap is lower than the base delay.
	#[error("Maximum delay {max_delay_ms}ms is lower than the base delay {base_delay_ms}ms.")]
	CapBelowBase {
		/// Configured base delay.
		base_delay_ms: u64,
		/// Configured backoff cap.
		max_delay_ms: u64,
	},
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Malformed { path, source: e.into_inner() }
	}
}
