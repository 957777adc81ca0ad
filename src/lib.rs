//! Paced, single-flight request queue for rate-limited upstream APIs—serialize calls, space them
//! out, and retry 429/5xx failures with jittered exponential backoff.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
#[cfg(feature = "reqwest")] pub mod http;
pub mod obs;
pub mod queue;
pub mod timer;

pub use config::QueueConfig;
pub use error::{Error, ErrorKind, Result, UpstreamError};
pub use event::{QueueEvent, QueueObserver};
pub use queue::{QueueBuilder, RequestQueue, Submission};

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::Error as ReqwestError;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(test)] use {color_eyre as _, httpmock as _};
