// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use serde::{Deserialize, Serialize};
use time::Duration;
// self
use backplane::{
	auth::ResourceId,
	cache::{CacheAside, detail_key, list_key},
	error::Error,
	store::{MemoryStore, SharedStore},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Post {
	id: String,
	title: String,
}

fn post(id: &str, title: &str) -> Post {
	Post { id: id.into(), title: title.into() }
}

fn resource(id: &str) -> ResourceId {
	ResourceId::new(id).expect("Fixture id should be valid.")
}

#[tokio::test]
async fn read_through_is_observationally_transparent() {
	let store = Arc::new(MemoryStore::default());
	let cache = CacheAside::new(store.clone());
	let loads = Arc::new(AtomicUsize::new(0));
	let key = detail_key("post", &resource("p1"));
	let record = post("p1", "hello");

	for expected_loads in [1, 1] {
		let loads_ = loads.clone();
		let record_ = record.clone();
		let served = cache
			.read_through::<Post, Error, _, _>(&key, Duration::minutes(5), move || async move {
				loads_.fetch_add(1, Ordering::SeqCst);

				Ok(Some(record_))
			})
			.await
			.expect("Loader does not fail in this test.")
			.expect("Post exists in the system of record.");

		// Cached and freshly loaded reads return the same value; the second
		// pass is served without touching the loader.
		assert_eq!(served, record);
		assert_eq!(loads.load(Ordering::SeqCst), expected_loads);
	}
}

#[tokio::test]
async fn not_found_is_never_cached() {
	let store = Arc::new(MemoryStore::default());
	let cache = CacheAside::new(store.clone());
	let loads = Arc::new(AtomicUsize::new(0));
	let key = detail_key("post", &resource("p404"));

	for _ in 0..2 {
		let loads = loads.clone();
		let served = cache
			.read_through::<Post, Error, _, _>(&key, Duration::minutes(5), move || async move {
				loads.fetch_add(1, Ordering::SeqCst);

				Ok(None)
			})
			.await
			.expect("Loader does not fail in this test.");

		assert!(served.is_none());
	}

	// Both misses hit the system of record; a later creation is immediately
	// visible.
	assert_eq!(loads.load(Ordering::SeqCst), 2);

	let created = post("p404", "late arrival");
	let served = cache
		.read_through::<Post, Error, _, _>(&key, Duration::minutes(5), {
			let created = created.clone();

			move || async move { Ok(Some(created)) }
		})
		.await
		.expect("Loader does not fail in this test.");

	assert_eq!(served, Some(created));
}

#[tokio::test]
async fn invalidation_flushes_detail_and_every_list_page() {
	let store = Arc::new(MemoryStore::default());
	let cache = CacheAside::new(store.clone());
	let id = resource("p1");
	let detail = detail_key("post", &id);
	let pages = [list_key("post", 1, 10), list_key("post", 2, 10), list_key("post", 1, 25)];

	for key in [&detail].into_iter().chain(&pages) {
		let record = post("p1", "v1");
		let _ = cache
			.read_through::<Post, Error, _, _>(key, Duration::minutes(5), move || async move {
				Ok(Some(record))
			})
			.await
			.expect("Loader does not fail in this test.");
	}

	cache.invalidate("post", &id).await;

	for key in [&detail].into_iter().chain(&pages) {
		assert!(
			store.get(key).await.expect("Memory get should not fail.").is_none(),
			"key {key} must not survive invalidation"
		);
	}
}

#[tokio::test]
async fn deleted_resource_does_not_serve_a_stale_snapshot() {
	let store = Arc::new(MemoryStore::default());
	let cache = CacheAside::new(store.clone());
	let id = resource("p1");
	let key = detail_key("post", &id);
	let record = post("p1", "hello");

	// Create, then read through to populate the cache.
	let served = cache
		.read_through::<Post, Error, _, _>(&key, Duration::minutes(5), {
			let record = record.clone();

			move || async move { Ok(Some(record)) }
		})
		.await
		.expect("Loader does not fail in this test.");

	assert_eq!(served, Some(record));

	// Delete the resource and invalidate on the write path.
	cache.invalidate("post", &id).await;

	// The next read consults the system of record, which reports absence.
	let served = cache
		.read_through::<Post, Error, _, _>(&key, Duration::minutes(5), move || async move {
			Ok(None)
		})
		.await
		.expect("Loader does not fail in this test.");

	assert_eq!(served, None);
}
