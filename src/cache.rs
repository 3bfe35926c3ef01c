//! Cache-aside accessor for read-heavy list/detail endpoints.
//!
//! Reads consult the shared store first and fall through to the system of
//! record on miss; writes invalidate coarsely (the detail key plus every
//! list key for the resource type). The cache is never authoritative: every
//! cache failure degrades to a direct system-of-record read with a warning,
//! and "not found" results are not cached so a later creation is visible
//! immediately.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::ResourceId,
	obs::{self, OpKind, OpOutcome, OpSpan, warn_degraded},
	store::SharedStore,
};

/// Detail snapshot key: `{type}:{id}`.
pub fn detail_key(resource_type: &str, id: &ResourceId) -> String {
	format!("{resource_type}:{id}")
}

/// List snapshot key: `{type}:list:{page}:{page_size}`.
///
/// The `list` segment keeps the invalidation prefix disjoint from detail
/// keys, so a coarse flush can never delete a detail snapshot.
pub fn list_key(resource_type: &str, page: u64, page_size: u64) -> String {
	format!("{resource_type}:list:{page}:{page_size}")
}

/// Prefix matched by every list key of a resource type.
pub fn list_prefix(resource_type: &str) -> String {
	format!("{resource_type}:list:")
}

/// Wraps read and invalidation paths around the shared store.
#[derive(Clone)]
pub struct CacheAside {
	store: Arc<dyn SharedStore>,
}
impl CacheAside {
	/// Creates an accessor over the shared store.
	pub fn new(store: Arc<dyn SharedStore>) -> Self {
		Self { store }
	}

	/// Checks the cache at `key`; on miss, invokes `loader` against the
	/// system of record, stores a `Some` result under `ttl`, and returns it.
	///
	/// The loader's error type passes through untouched; cache-side failures
	/// (store unreachable, undecodable snapshot) degrade to the loader path.
	pub async fn read_through<T, E, F, Fut>(
		&self,
		key: &str,
		ttl: Duration,
		loader: F,
	) -> Result<Option<T>, E>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Option<T>, E>>,
	{
		const KIND: OpKind = OpKind::CacheRead;

		let span = OpSpan::new(KIND, "read_through");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				match self.store.get(key).await {
					Ok(Some(snapshot)) => match serde_json::from_str::<T>(&snapshot) {
						Ok(value) => return Ok(Some(value)),
						Err(e) => warn_degraded(
							KIND,
							&format!("undecodable snapshot at {key}, reloading: {e}"),
						),
					},
					Ok(None) => {},
					Err(e) =>
						warn_degraded(KIND, &format!("cache read failed for {key}, bypassing: {e}")),
				}

				let loaded = loader().await?;

				if let Some(value) = &loaded {
					match serde_json::to_string(value) {
						Ok(snapshot) =>
							if let Err(e) = self.store.put(key, snapshot, ttl).await {
								warn_degraded(KIND, &format!("cache fill failed for {key}: {e}"));
							},
						Err(e) =>
							warn_degraded(KIND, &format!("snapshot encoding failed for {key}: {e}")),
					}
				}

				Ok(loaded)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}

	/// Invalidates a mutated resource: deletes its detail key and flushes
	/// every list key of the resource type.
	///
	/// The full-list flush trades precision for correctness; tracking which
	/// pages contain the resource would save a handful of reloads at the
	/// cost of an invalidation index.
	pub async fn invalidate(&self, resource_type: &str, id: &ResourceId) {
		const KIND: OpKind = OpKind::CacheInvalidate;

		let span = OpSpan::new(KIND, "invalidate");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		span.instrument(async move {
			if let Err(e) = self.store.delete(&detail_key(resource_type, id)).await {
				warn_degraded(KIND, &format!("detail invalidation failed for {resource_type}:{id}: {e}"));
			}
			if let Err(e) = self.store.delete_prefix(&list_prefix(resource_type)).await {
				warn_degraded(KIND, &format!("list flush failed for {resource_type}: {e}"));
			}
		})
		.await;

		obs::record_op_outcome(KIND, OpOutcome::Success);
	}
}
