//! Type-erased queued work.

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, error::UpstreamError};

/// Boxed future returned by [`Job::run`].
pub(crate) type JobFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UpstreamError>> + 'a + Send>>;

/// A submitted task with its result type erased.
///
/// `run` may be called repeatedly; on success the typed value is delivered to the caller before
/// the future resolves.
pub(crate) trait Job
where
	Self: Send,
{
	/// Invokes the wrapped operation once.
	fn run(&mut self) -> JobFuture<'_>;

	/// Settles the caller's submission with a terminal error.
	fn reject(&mut self, error: Error);

	/// Whether the caller has dropped its submission.
	fn is_abandoned(&self) -> bool;
}

/// [`Job`] over a concrete operation and result type.
pub(crate) struct TypedJob<F, T> {
	execute: F,
	reply: Option<oneshot::Sender<Result<T>>>,
}
impl<F, T> TypedJob<F, T> {
	pub(crate) fn new(execute: F, reply: oneshot::Sender<Result<T>>) -> Self {
		Self { execute, reply: Some(reply) }
	}
}
impl<F, Fut, T> Job for TypedJob<F, T>
where
	F: 'static + Send + FnMut() -> Fut,
	Fut: 'static + Send + Future<Output = Result<T, UpstreamError>>,
	T: 'static + Send,
{
	fn run(&mut self) -> JobFuture<'_> {
		let attempt = (self.execute)();
		let reply = &mut self.reply;

		Box::pin(async move {
			let value = attempt.await?;

			if let Some(reply) = reply.take() {
				let _ = reply.send(Ok(value));
			}

			Ok(())
		})
	}

	fn reject(&mut self, error: Error) {
		if let Some(reply) = self.reply.take() {
			let _ = reply.send(Err(error));
		}
	}

	fn is_abandoned(&self) -> bool {
		self.reply.as_ref().is_none_or(oneshot::Sender::is_closed)
	}
}
