// std
use std::sync::Arc;
// self
use backplane::{
	asset::MemoryAssetHost,
	auth::ResourceId,
	event::{
		BrokerError, BrokerFuture, CascadeConsumer, CascadeDelete, DomainEvent, EventBroker,
		EventPublisher, EventSubscription, MemoryBroker, MemoryDependentStore, POST_DELETED_KEY,
	},
};

fn resource(id: &str) -> ResourceId {
	ResourceId::new(id).expect("Fixture id should be valid.")
}

fn cascade(parent: &str, dependents: &[&str]) -> CascadeDelete {
	CascadeDelete {
		parent_id: resource(parent),
		dependent_ids: dependents.iter().map(|id| resource(id)).collect(),
	}
}

fn seeded_consumer(ids: &[&str]) -> (CascadeConsumer, MemoryDependentStore, MemoryAssetHost) {
	let dependents = MemoryDependentStore::default();
	let assets = MemoryAssetHost::default();

	for id in ids {
		dependents.insert(resource(id));
	}

	let consumer = CascadeConsumer::new(Arc::new(dependents.clone()), Arc::new(assets.clone()));

	(consumer, dependents, assets)
}

#[tokio::test]
async fn published_deletion_cascades_through_the_consumer() {
	let broker = MemoryBroker::default();
	let subscription = broker.subscribe_queue(&[POST_DELETED_KEY]);
	let publisher = EventPublisher::new(Arc::new(broker));
	let (consumer, dependents, assets) = seeded_consumer(&["m1", "m2"]);

	assert!(publisher.publish_cascade_delete(&cascade("post1", &["m1", "m2"])).await.is_published());

	let processed = consumer
		.drain(&subscription)
		.await
		.expect("Draining the memory queue should not fail.");

	assert_eq!(processed, 1);
	assert!(!dependents.contains(&resource("m1")));
	assert!(!dependents.contains(&resource("m2")));
	assert_eq!(assets.deleted(), vec![resource("m1"), resource("m2")]);
	// Everything was acknowledged; a broker redelivery pass finds nothing.
	assert_eq!(subscription.redeliver().await, 0);
}

#[tokio::test]
async fn redelivery_after_a_crash_is_idempotent() {
	let broker = MemoryBroker::default();
	let subscription = broker.subscribe_queue(&[POST_DELETED_KEY]);
	let publisher = EventPublisher::new(Arc::new(broker));
	let (consumer, dependents, assets) = seeded_consumer(&["m1", "m2"]);

	assert!(publisher.publish_cascade_delete(&cascade("post1", &["m1", "m2"])).await.is_published());

	// First attempt: side effects run, but the consumer "crashes" before the
	// acknowledgment, so the broker redelivers.
	let delivery = subscription
		.next()
		.await
		.expect("Memory next should not fail.")
		.expect("Queue should hold the published event.");
	let first = consumer
		.handle(&delivery)
		.await
		.expect("Well-formed payload should decode.");

	assert_eq!((first.deleted, first.missing, first.failed), (2, 0, 0));
	assert_eq!(subscription.redeliver().await, 1);

	// Second attempt processes the same event to completion; the dependents
	// are already gone, which is a no-op rather than an error.
	let processed = consumer
		.drain(&subscription)
		.await
		.expect("Draining the memory queue should not fail.");

	assert_eq!(processed, 1);
	assert!(!dependents.contains(&resource("m1")));
	assert_eq!(assets.deleted(), vec![resource("m1"), resource("m2")]);
	assert_eq!(subscription.redeliver().await, 0);
}

#[tokio::test]
async fn subscription_via_the_trait_object_drives_the_same_loop() {
	let broker = MemoryBroker::default();
	let subscription = broker
		.subscribe(&[POST_DELETED_KEY])
		.await
		.expect("Memory subscribe should not fail.");
	let publisher = EventPublisher::new(Arc::new(broker));
	let (consumer, dependents, _assets) = seeded_consumer(&["m1"]);

	assert!(publisher.publish_cascade_delete(&cascade("post1", &["m1"])).await.is_published());

	let processed = consumer
		.drain(subscription.as_ref())
		.await
		.expect("Draining the memory queue should not fail.");

	assert_eq!(processed, 1);
	assert!(!dependents.contains(&resource("m1")));
}

struct DownBroker;
impl EventBroker for DownBroker {
	fn publish<'a>(&'a self, _event: &'a DomainEvent) -> BrokerFuture<'a, ()> {
		Box::pin(async { Err(BrokerError::Connection { message: "exchange unreachable".into() }) })
	}

	fn subscribe<'a>(
		&'a self,
		_routing_keys: &'a [&'a str],
	) -> BrokerFuture<'a, Box<dyn EventSubscription>> {
		Box::pin(async { Err(BrokerError::Connection { message: "exchange unreachable".into() }) })
	}
}

#[tokio::test]
async fn publish_failure_is_reported_but_not_fatal() {
	let publisher = EventPublisher::new(Arc::new(DownBroker));
	let outcome = publisher.publish_cascade_delete(&cascade("post1", &["m1"])).await;

	match outcome {
		backplane::event::PublishOutcome::Failed { message } =>
			assert!(message.contains("exchange unreachable")),
		other => panic!("Expected a failed publication outcome, got: {other:?}."),
	}
}

#[tokio::test]
async fn unrelated_routing_keys_do_not_reach_the_consumer() {
	let broker = MemoryBroker::default();
	let subscription = broker.subscribe_queue(&["user.created"]);
	let publisher = EventPublisher::new(Arc::new(broker));
	let (consumer, dependents, _assets) = seeded_consumer(&["m1"]);

	assert!(publisher.publish_cascade_delete(&cascade("post1", &["m1"])).await.is_published());

	let processed = consumer
		.drain(&subscription)
		.await
		.expect("Draining the memory queue should not fail.");

	assert_eq!(processed, 0);
	assert!(dependents.contains(&resource("m1")));
}
