//! Consumer side of the event propagator: idempotent cascading deletes.
//!
//! The consumer pulls deletion events, removes every dependent resource from
//! its durable store and from the external asset host, and acknowledges the
//! message once the loop has run. Re-delivery after a crash is safe because
//! deleting an absent resource is a no-op on both sides.

// std
use std::collections::HashSet;
// self
use crate::{
	_prelude::*,
	asset::AssetHost,
	auth::ResourceId,
	event::{BrokerError, Delivery, EventSubscription, decode_cascade_delete},
	obs::{self, OpKind, OpOutcome, OpSpan, warn_degraded},
	store::StoreFuture,
};

/// Durable store holding the dependent resources a cascade removes.
pub trait DependentStore
where
	Self: Send + Sync,
{
	/// Deletes the resource, returning whether it existed. Absent resources
	/// return `Ok(false)`, never an error.
	fn delete_dependent<'a>(&'a self, id: &'a ResourceId) -> StoreFuture<'a, bool>;
}

/// In-process [`DependentStore`] for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryDependentStore {
	rows: Arc<RwLock<HashSet<ResourceId>>>,
}
impl MemoryDependentStore {
	/// Seeds a resource row.
	pub fn insert(&self, id: ResourceId) {
		self.rows.write().insert(id);
	}

	/// Whether the resource row still exists.
	pub fn contains(&self, id: &ResourceId) -> bool {
		self.rows.read().contains(id)
	}
}
impl DependentStore for MemoryDependentStore {
	fn delete_dependent<'a>(&'a self, id: &'a ResourceId) -> StoreFuture<'a, bool> {
		let rows = self.rows.clone();

		Box::pin(async move { Ok(rows.write().remove(id)) })
	}
}

/// Aggregate result of processing one cascading-delete event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
	/// Dependents removed from both the store and the asset host.
	pub deleted: usize,
	/// Dependents that were already gone (redelivery or racing delete).
	pub missing: usize,
	/// Dependents whose cleanup failed and was logged.
	pub failed: usize,
}
impl CascadeOutcome {
	/// Whether every dependent was handled without a per-item failure.
	pub fn is_clean(&self) -> bool {
		self.failed == 0
	}
}

/// Drives cascading deletes from a broker subscription.
#[derive(Clone)]
pub struct CascadeConsumer {
	dependents: Arc<dyn DependentStore>,
	assets: Arc<dyn AssetHost>,
}
impl CascadeConsumer {
	/// Creates a consumer over the dependent store and asset host.
	pub fn new(dependents: Arc<dyn DependentStore>, assets: Arc<dyn AssetHost>) -> Self {
		Self { dependents, assets }
	}

	/// Pulls and processes every currently available message, acknowledging
	/// each after its side effects ran; returns how many were processed.
	///
	/// Per-item failures are logged and do not hold the message hostage: the
	/// event is acknowledged once the loop completes, so a failed item is
	/// retried only when the consumer crashes before the ack (idempotent, so
	/// safe). Undecodable payloads are logged, acknowledged, and dropped so
	/// a poison message cannot wedge the queue.
	pub async fn drain(&self, subscription: &dyn EventSubscription) -> Result<u64, BrokerError> {
		let mut processed = 0;

		while let Some(delivery) = subscription.next().await? {
			self.handle(&delivery).await;
			subscription.ack(delivery.tag).await?;

			processed += 1;
		}

		Ok(processed)
	}

	/// Processes one delivery and reports the aggregate outcome; `None` when
	/// the payload did not decode.
	pub async fn handle(&self, delivery: &Delivery) -> Option<CascadeOutcome> {
		const KIND: OpKind = OpKind::Consume;

		let span = OpSpan::new(KIND, "cascade_delete");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let event = match decode_cascade_delete(&delivery.payload) {
					Ok(event) => event,
					Err(e) => {
						warn_degraded(
							KIND,
							&format!("dropping undecodable cascade payload at {}: {e}", e.path()),
						);

						return None;
					},
				};
				let mut outcome = CascadeOutcome::default();

				for id in &event.dependent_ids {
					if let Err(e) = self.assets.delete_asset(id).await {
						warn_degraded(
							KIND,
							&format!("asset cleanup failed for {id} of {}: {e}", event.parent_id),
						);

						outcome.failed += 1;

						continue;
					}

					match self.dependents.delete_dependent(id).await {
						Ok(true) => outcome.deleted += 1,
						Ok(false) => outcome.missing += 1,
						Err(e) => {
							warn_degraded(
								KIND,
								&format!(
									"store cleanup failed for {id} of {}: {e}",
									event.parent_id
								),
							);

							outcome.failed += 1;
						},
					}
				}

				Some(outcome)
			})
			.await;

		match outcome {
			Some(outcome) if outcome.is_clean() =>
				obs::record_op_outcome(KIND, OpOutcome::Success),
			_ => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		asset::MemoryAssetHost,
		event::{CascadeDelete, DomainEvent},
	};

	fn resource(id: &str) -> ResourceId {
		ResourceId::new(id).expect("Fixture id should be valid.")
	}

	fn delivery(parent: &str, dependents: &[&str]) -> Delivery {
		let payload = CascadeDelete {
			parent_id: resource(parent),
			dependent_ids: dependents.iter().map(|id| resource(id)).collect(),
		};
		let event =
			DomainEvent::cascade_delete(&payload).expect("Encoding a fixture payload should succeed.");

		Delivery { routing_key: event.routing_key, payload: event.payload, tag: 1 }
	}

	#[tokio::test]
	async fn per_item_failure_does_not_stop_the_loop() {
		let dependents = MemoryDependentStore::default();
		let assets = MemoryAssetHost::default();

		for id in ["m1", "m2", "m3"] {
			dependents.insert(resource(id));
		}

		assets.fail_on(resource("m2"));

		let consumer =
			CascadeConsumer::new(Arc::new(dependents.clone()), Arc::new(assets.clone()));
		let outcome = consumer
			.handle(&delivery("post1", &["m1", "m2", "m3"]))
			.await
			.expect("Well-formed payload should decode.");

		assert_eq!(outcome, CascadeOutcome { deleted: 2, missing: 0, failed: 1 });
		assert!(dependents.contains(&resource("m2")));
		assert_eq!(assets.deleted(), vec![resource("m1"), resource("m3")]);
	}

	#[tokio::test]
	async fn undecodable_payload_is_dropped() {
		let consumer = CascadeConsumer::new(
			Arc::new(MemoryDependentStore::default()),
			Arc::new(MemoryAssetHost::default()),
		);
		let poison =
			Delivery { routing_key: "post.deleted".into(), payload: b"not json".to_vec(), tag: 7 };

		assert_eq!(consumer.handle(&poison).await, None);
	}
}
