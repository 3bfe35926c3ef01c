//! Thread-safe in-memory backend implementing both store contracts.
//!
//! Suitable for tests and single-process deployments. Entries carry explicit
//! expiries and are pruned lazily on access, mirroring the TTL behavior of
//! the production counter store.

// self
use crate::{
	_prelude::*,
	auth::RefreshRecord,
	store::{CounterSlot, CredentialStore, SharedStore, StoreFuture},
};

#[derive(Clone, Debug)]
struct CounterEntry {
	count: u64,
	expires_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
struct ValueEntry {
	value: String,
	expires_at: OffsetDateTime,
}

type CounterMap = Arc<RwLock<HashMap<String, CounterEntry>>>;
type ValueMap = Arc<RwLock<HashMap<String, ValueEntry>>>;
type CredentialMap = Arc<RwLock<HashMap<String, RefreshRecord>>>;

/// In-process implementation of [`SharedStore`] and [`CredentialStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	counters: CounterMap,
	values: ValueMap,
	credentials: CredentialMap,
}
impl MemoryStore {
	fn increment_now(
		counters: CounterMap,
		key: String,
		ttl: Duration,
		now: OffsetDateTime,
	) -> CounterSlot {
		let mut guard = counters.write();
		let entry = guard
			.entry(key)
			.and_modify(|entry| {
				if entry.expires_at <= now {
					entry.count = 0;
					entry.expires_at = now + ttl;
				}
			})
			.or_insert_with(|| CounterEntry { count: 0, expires_at: now + ttl });

		entry.count += 1;

		CounterSlot { count: entry.count, expires_at: entry.expires_at }
	}

	fn get_now(values: ValueMap, key: &str) -> Option<String> {
		let now = OffsetDateTime::now_utc();
		let mut guard = values.write();

		match guard.get(key) {
			Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
			Some(_) => {
				guard.remove(key);

				None
			},
			None => None,
		}
	}

	fn put_now(values: ValueMap, key: String, value: String, ttl: Duration) {
		let expires_at = OffsetDateTime::now_utc() + ttl;

		values.write().insert(key, ValueEntry { value, expires_at });
	}

	fn delete_prefix_now(values: ValueMap, prefix: &str) -> u64 {
		let mut guard = values.write();
		let before = guard.len();

		guard.retain(|key, _| !key.starts_with(prefix));

		(before - guard.len()) as u64
	}

	/// Number of live (unexpired) cached values; used by tests and health
	/// probes.
	pub fn live_values(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.values.read().values().filter(|entry| entry.expires_at > now).count()
	}
}
impl SharedStore for MemoryStore {
	fn increment<'a>(
		&'a self,
		key: &'a str,
		ttl: Duration,
		now: OffsetDateTime,
	) -> StoreFuture<'a, CounterSlot> {
		let counters = self.counters.clone();
		let key = key.to_owned();

		Box::pin(async move { Ok(Self::increment_now(counters, key, ttl, now)) })
	}

	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let values = self.values.clone();

		Box::pin(async move { Ok(Self::get_now(values, key)) })
	}

	fn put<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		let values = self.values.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::put_now(values, key, value, ttl);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let values = self.values.clone();

		Box::pin(async move {
			values.write().remove(key);

			Ok(())
		})
	}

	fn delete_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, u64> {
		let values = self.values.clone();

		Box::pin(async move { Ok(Self::delete_prefix_now(values, prefix)) })
	}
}
impl CredentialStore for MemoryStore {
	fn save(&self, record: RefreshRecord) -> StoreFuture<'_, ()> {
		let credentials = self.credentials.clone();

		Box::pin(async move {
			credentials.write().insert(record.digest.clone(), record);

			Ok(())
		})
	}

	fn take<'a>(&'a self, digest: &'a str) -> StoreFuture<'a, Option<RefreshRecord>> {
		let credentials = self.credentials.clone();

		// Removal under the write lock is the whole trick: concurrent takers
		// of the same digest serialize here and only the first sees the record.
		Box::pin(async move { Ok(credentials.write().remove(digest)) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, u64> {
		let credentials = self.credentials.clone();

		Box::pin(async move {
			let mut guard = credentials.write();
			let before = guard.len();

			guard.retain(|_, record| record.expires_at > now);

			Ok((before - guard.len()) as u64)
		})
	}
}
