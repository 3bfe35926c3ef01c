//! Storage contracts for the shared counter/cache store and the durable
//! refresh-credential store, plus the built-in in-memory backend.
//!
//! Every cross-process guarantee in the crate reduces to one atomic operation
//! on one of these traits: [`SharedStore::increment`] linearizes admission
//! counters and [`CredentialStore::take`] enforces single-use refresh
//! rotation. Implementations must keep each method a single atomic step
//! against the backend and must bound every network call with a deadline,
//! reporting overruns as [`StoreError::Backend`].

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::RefreshRecord};

/// Boxed future returned by store trait methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure, including exceeded deadlines.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Snapshot of a counter entry returned by [`SharedStore::increment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSlot {
	/// Count after the increment was applied.
	pub count: u64,
	/// Instant at which the entry self-expires.
	pub expires_at: OffsetDateTime,
}

/// Shared key-value store with TTL semantics and an atomic increment.
///
/// Backends are multi-writer and multi-reader; callers never hold a lease
/// across more than one operation. Keys follow the crate-wide convention of
/// colon-separated segments (see [`crate::cache`] and [`crate::admission`]).
pub trait SharedStore
where
	Self: Send + Sync,
{
	/// Atomically increments the counter at `key`, creating it with `ttl` on
	/// first touch, and returns the post-increment state.
	///
	/// The increment-and-compare contract for admission control depends on
	/// this being one round trip; implementations must never emulate it with
	/// a read followed by a write.
	fn increment<'a>(
		&'a self,
		key: &'a str,
		ttl: Duration,
		now: OffsetDateTime,
	) -> StoreFuture<'a, CounterSlot>;

	/// Fetches the live value at `key`, if present and unexpired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` at `key` with the provided TTL, replacing any entry.
	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Deletes the entry at `key`; absent keys are not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Deletes every entry whose key starts with `prefix`, returning the
	/// number removed.
	fn delete_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, u64>;
}

/// Durable store for refresh-credential records.
///
/// Records are keyed by the digest of the opaque secret; the raw secret never
/// reaches the backend.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Persists a refresh record, replacing any record under the same digest.
	fn save(&self, record: RefreshRecord) -> StoreFuture<'_, ()>;

	/// Atomically removes and returns the record under `digest`.
	///
	/// This conditional delete-returning-prior-value is the primitive behind
	/// single-use rotation: of N concurrent calls with the same digest,
	/// exactly one observes `Some`.
	fn take<'a>(&'a self, digest: &'a str) -> StoreFuture<'a, Option<RefreshRecord>>;

	/// Removes records whose expiry is at or before `now`, returning the
	/// number purged.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, u64>;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{Error, ExternalError};

	#[test]
	fn store_error_converts_into_backplane_error_with_message() {
		let store_error = StoreError::Backend { message: "connection refused".into() };
		let error: Error = store_error.into();

		assert!(matches!(error, Error::External(ExternalError::Store { .. })));
		assert!(error.to_string().contains("connection refused"));
	}
}
