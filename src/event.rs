//! Side-channel notifications emitted by the drain loop.
//!
//! Observers are injected through [`QueueBuilder::observer`](crate::queue::QueueBuilder::observer)
//! and are called synchronously from the drain task, so they should return quickly. They never
//! influence retry or settlement decisions.

// std
use std::time::Duration;
// self
use crate::{_prelude::*, error::UpstreamError};

/// Monitoring event describing the outcome of one dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum QueueEvent {
	/// A task completed successfully.
	#[serde(rename = "requestSuccess")]
	Success(SuccessEvent),
	/// A task failed transiently and was scheduled for another attempt.
	#[serde(rename = "requestRetry")]
	Retry(RetryEvent),
	/// A task failed terminally.
	#[serde(rename = "requestError")]
	Error(ErrorEvent),
}
impl QueueEvent {
	/// Identifier of the task the event refers to.
	pub fn task_id(&self) -> u64 {
		match self {
			Self::Success(e) => e.task_id,
			Self::Retry(e) => e.task_id,
			Self::Error(e) => e.task_id,
		}
	}

	/// Instant the event was emitted.
	pub fn timestamp(&self) -> OffsetDateTime {
		match self {
			Self::Success(e) => e.timestamp,
			Self::Retry(e) => e.timestamp,
			Self::Error(e) => e.timestamp,
		}
	}
}

/// Payload of [`QueueEvent::Success`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessEvent {
	/// Task identifier.
	pub task_id: u64,
	/// Tasks still waiting when the event was emitted.
	pub queue_length: usize,
	/// Emission time.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Payload of [`QueueEvent::Retry`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEvent {
	/// Task identifier.
	pub task_id: u64,
	/// Failure that triggered the retry.
	pub error: UpstreamError,
	/// Retries consumed so far, including this one.
	pub retry_count: u32,
	/// Backoff applied before the next attempt.
	#[serde(serialize_with = "serialize_millis")]
	pub delay: Duration,
	/// Emission time.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Payload of [`QueueEvent::Error`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
	/// Task identifier.
	pub task_id: u64,
	/// Final upstream failure.
	pub error: UpstreamError,
	/// Number of dispatches made for the task.
	pub attempts: u32,
	/// Emission time.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Receives [`QueueEvent`]s.
pub trait QueueObserver
where
	Self: Send + Sync,
{
	/// Handles one event.
	fn on_event(&self, event: &QueueEvent);
}
impl<F> QueueObserver for F
where
	F: Send + Sync + Fn(&QueueEvent),
{
	fn on_event(&self, event: &QueueEvent) {
		self(event)
	}
}

fn serialize_millis<S>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
	S: serde::Serializer,
{
	serializer.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
}
