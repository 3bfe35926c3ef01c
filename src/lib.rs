//! Shared admission-control and consistency layer for multi-service
//! backends: atomic rate limiting, rotating refresh credentials, cache-aside
//! reads, and idempotent event fan-out behind injectable store and broker
//! seams.
//!
//! Services coordinate only through the shared counter store and the message
//! broker; every cross-process guarantee in this crate reduces to a single
//! atomic operation on one of those collaborators. Construct the components
//! once per process with explicit handles (connect at startup, close at
//! shutdown) and share them across request workers.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod admission;
pub mod asset;
pub mod auth;
pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod obs;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
