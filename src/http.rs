//! reqwest adapter for queueing HTTP calls.
//!
//! [`error_for_status`] turns 4xx/5xx responses into [`UpstreamError`]s carrying the status code,
//! which is all the queue needs to decide whether a failure is retryable. Provider error bodies in
//! the common `{"error": {"message": ..., "code": ...}}` shape are unpacked so callers see the
//! provider's own message; anything else is reduced to a short preview of the body.
//!
//! [`RequestQueue::submit_request`] and [`RequestQueue::submit_json`] rebuild the request from a
//! factory on every attempt, since a sent [`RequestBuilder`] cannot be replayed.

// crates.io
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::UpstreamError,
	queue::{RequestQueue, Submission},
};

const BODY_PREVIEW_LIMIT: usize = 256;

impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		let code = if e.is_timeout() {
			"timeout"
		} else if e.is_connect() {
			"connect"
		} else if e.is_decode() {
			"decode"
		} else {
			"request"
		};

		Self {
			status: e.status().map(|s| s.as_u16()),
			code: Some(code.into()),
			message: e.to_string(),
		}
	}
}

impl RequestQueue {
	/// Queues an HTTP request built by `build` and resolves to the successful response.
	///
	/// Each attempt calls `build` again, sends the request, and classifies the response with
	/// [`error_for_status`].
	pub fn submit_request<F>(&self, mut build: F) -> Submission<Response>
	where
		F: 'static + Send + FnMut() -> RequestBuilder,
	{
		self.submit(move || {
			let request = build();

			async move {
				let response = request.send().await?;

				error_for_status(response).await
			}
		})
	}

	/// Like [`submit_request`](Self::submit_request), but decodes the response body as JSON.
	///
	/// A body that fails to decode is reported as a non-retryable failure with code `decode`.
	pub fn submit_json<F, T>(&self, mut build: F) -> Submission<T>
	where
		F: 'static + Send + FnMut() -> RequestBuilder,
		T: 'static + Send + DeserializeOwned,
	{
		self.submit(move || {
			let request = build();

			async move {
				let response = error_for_status(request.send().await?).await?;
				let body = response.bytes().await?;

				serde_json::from_slice(&body).map_err(|e| {
					UpstreamError::new(format!("Upstream returned an undecodable body: {e}."))
						.code("decode")
				})
			}
		})
	}
}

/// Passes non-error responses through and converts 4xx/5xx responses into [`UpstreamError`]s.
pub async fn error_for_status(response: Response) -> Result<Response, UpstreamError> {
	let status = response.status();

	if !status.is_client_error() && !status.is_server_error() {
		return Ok(response);
	}

	match response.text().await {
		Ok(body) => Err(upstream_error(status, &body)),
		Err(e) => Err(unreadable_body(status, e)),
	}
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
	message: String,
	code: Option<String>,
	#[serde(rename = "type")]
	kind: Option<String>,
}

fn upstream_error(status: StatusCode, body: &str) -> UpstreamError {
	let status_code = Some(status.as_u16());

	if let Ok(ErrorEnvelope { error }) = serde_json::from_str::<ErrorEnvelope>(body) {
		return UpstreamError {
			status: status_code,
			code: error.code.or(error.kind),
			message: error.message,
		};
	}

	let body = body.trim();
	let message =
		if body.is_empty() { format!("Upstream returned {status}.") } else { truncate_preview(body) };

	UpstreamError { status: status_code, code: None, message }
}

fn unreadable_body(status: StatusCode, error: impl Display) -> UpstreamError {
	UpstreamError::with_status(
		status.as_u16(),
		format!("Upstream returned {status}, but its body could not be read: {error}."),
	)
	.code("body")
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
