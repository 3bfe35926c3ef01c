//! In-process [`EventBroker`] with direct-exchange semantics, for tests and
//! single-process deployments.
//!
//! Messages route by exact routing-key match to every bound queue. Consumed
//! but unacknowledged messages are retained and can be pushed back onto the
//! queue with [`MemorySubscription::redeliver`], which is how the idempotency
//! suites simulate a consumer crash between side effect and acknowledgment.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	event::{BrokerFuture, Delivery, DomainEvent, EventBroker, EventSubscription},
};

#[derive(Debug, Default)]
struct QueueState {
	pending: VecDeque<Delivery>,
	unacked: HashMap<u64, Delivery>,
}

type Queue = Arc<AsyncMutex<QueueState>>;

/// In-process publish/subscribe exchange.
#[derive(Clone, Debug, Default)]
pub struct MemoryBroker {
	bindings: Arc<RwLock<HashMap<String, Vec<Queue>>>>,
	next_tag: Arc<AtomicU64>,
}
impl MemoryBroker {
	/// Declares a transient queue bound to `routing_keys` and returns the
	/// concrete subscription, exposing the redelivery hook the trait hides.
	pub fn subscribe_queue(&self, routing_keys: &[&str]) -> MemorySubscription {
		let queue: Queue = Arc::new(AsyncMutex::new(QueueState::default()));
		let mut bindings = self.bindings.write();

		for key in routing_keys {
			bindings.entry((*key).to_owned()).or_default().push(queue.clone());
		}

		MemorySubscription { queue }
	}
}
impl EventBroker for MemoryBroker {
	fn publish<'a>(&'a self, event: &'a DomainEvent) -> BrokerFuture<'a, ()> {
		// Snapshot the bound queues before suspending; the bindings lock must
		// not be held across an await point.
		let queues: Vec<Queue> =
			self.bindings.read().get(&event.routing_key).cloned().unwrap_or_default();
		let next_tag = self.next_tag.clone();
		let event = event.clone();

		Box::pin(async move {
			for queue in queues {
				let delivery = Delivery {
					routing_key: event.routing_key.clone(),
					payload: event.payload.clone(),
					tag: next_tag.fetch_add(1, Ordering::Relaxed),
				};

				queue.lock().await.pending.push_back(delivery);
			}

			Ok(())
		})
	}

	fn subscribe<'a>(
		&'a self,
		routing_keys: &'a [&'a str],
	) -> BrokerFuture<'a, Box<dyn EventSubscription>> {
		let subscription = self.subscribe_queue(routing_keys);

		Box::pin(async move { Ok(Box::new(subscription) as Box<dyn EventSubscription>) })
	}
}

/// Pull handle over one in-process queue.
#[derive(Clone, Debug)]
pub struct MemorySubscription {
	queue: Queue,
}
impl MemorySubscription {
	/// Pushes every unacknowledged message back onto the queue in tag order,
	/// returning how many were requeued.
	pub async fn redeliver(&self) -> usize {
		let mut state = self.queue.lock().await;
		let mut stale: Vec<Delivery> = state.unacked.drain().map(|(_, d)| d).collect();

		stale.sort_by_key(|delivery| delivery.tag);

		let count = stale.len();

		for delivery in stale {
			state.pending.push_back(delivery);
		}

		count
	}

	/// Number of messages waiting to be consumed.
	pub async fn depth(&self) -> usize {
		self.queue.lock().await.pending.len()
	}
}
impl EventSubscription for MemorySubscription {
	fn next(&self) -> BrokerFuture<'_, Option<Delivery>> {
		let queue = self.queue.clone();

		Box::pin(async move {
			let mut state = queue.lock().await;
			let delivery = state.pending.pop_front();

			if let Some(delivery) = &delivery {
				state.unacked.insert(delivery.tag, delivery.clone());
			}

			Ok(delivery)
		})
	}

	fn ack(&self, tag: u64) -> BrokerFuture<'_, ()> {
		let queue = self.queue.clone();

		Box::pin(async move {
			queue.lock().await.unacked.remove(&tag);

			Ok(())
		})
	}
}
