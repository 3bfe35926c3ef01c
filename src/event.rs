//! Asynchronous cross-service consistency via a publish/subscribe broker.
//!
//! Mutations publish [`DomainEvent`]s under fixed routing keys; consumers
//! run a pull loop (receive, decode, side-effect, acknowledge) and must be
//! idempotent because delivery is at-least-once with no ordering guarantees
//! between unrelated events.

pub mod cascade;
pub mod memory;

pub use cascade::{CascadeConsumer, CascadeOutcome, DependentStore, MemoryDependentStore};
pub use memory::MemoryBroker;

// self
use crate::{
	_prelude::*,
	auth::ResourceId,
	obs::{self, OpKind, OpOutcome, OpSpan, warn_degraded},
};

/// Exchange carrying post-lifecycle events.
pub const CASCADE_EXCHANGE: &str = "posts";
/// Routing key for parent-deletion events.
pub const POST_DELETED_KEY: &str = "post.deleted";

/// Boxed future returned by broker trait methods.
pub type BrokerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BrokerError>> + 'a + Send>>;

/// Error type produced by [`EventBroker`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BrokerError {
	/// Broker connection is down or the channel was refused.
	#[error("Connection failure: {message}.")]
	Connection {
		/// Human-readable error payload.
		message: String,
	},
	/// Publication was rejected or lost before the broker confirmed it.
	#[error("Publish failure: {message}.")]
	Publish {
		/// Human-readable error payload.
		message: String,
	},
	/// A bounded broker call exceeded its deadline.
	#[error("Broker call timed out.")]
	Timeout,
}

/// One routed message: an opaque payload under a routing key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainEvent {
	/// Exchange routing key.
	pub routing_key: String,
	/// Opaque byte payload; JSON for the events this crate defines.
	pub payload: Vec<u8>,
}
impl DomainEvent {
	/// Builds the cascading-delete event for a removed parent resource.
	pub fn cascade_delete(payload: &CascadeDelete) -> Result<Self> {
		let bytes = serde_json::to_vec(payload)
			.map_err(|e| Error::Internal { message: format!("event payload encoding: {e}") })?;

		Ok(Self { routing_key: POST_DELETED_KEY.into(), payload: bytes })
	}
}

/// Wire payload of a cascading-delete event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeDelete {
	/// Deleted parent resource.
	pub parent_id: ResourceId,
	/// Dependent resources the consumer must remove.
	pub dependent_ids: Vec<ResourceId>,
}

/// Decodes a cascading-delete payload, reporting the JSON path on failure.
pub fn decode_cascade_delete(
	payload: &[u8],
) -> Result<CascadeDelete, serde_path_to_error::Error<serde_json::Error>> {
	let mut deserializer = serde_json::Deserializer::from_slice(payload);

	serde_path_to_error::deserialize(&mut deserializer)
}

/// A message handed to a consumer; must be acknowledged by tag once its side
/// effects are durable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
	/// Routing key the message was published under.
	pub routing_key: String,
	/// Opaque payload bytes.
	pub payload: Vec<u8>,
	/// Broker-assigned acknowledgment tag.
	pub tag: u64,
}

/// Publish/subscribe exchange contract.
///
/// Implementations must bound every network call with a deadline and report
/// overruns as [`BrokerError::Timeout`].
pub trait EventBroker
where
	Self: Send + Sync,
{
	/// Publishes an event to the exchange under its routing key.
	fn publish<'a>(&'a self, event: &'a DomainEvent) -> BrokerFuture<'a, ()>;

	/// Declares a transient exclusive queue bound to `routing_keys` and
	/// returns a pull-style subscription over it.
	fn subscribe<'a>(
		&'a self,
		routing_keys: &'a [&'a str],
	) -> BrokerFuture<'a, Box<dyn EventSubscription>>;
}

/// Pull-style consumption handle over one queue.
pub trait EventSubscription
where
	Self: Send + Sync,
{
	/// Receives the next available message, or `None` when the queue is
	/// currently empty.
	fn next(&self) -> BrokerFuture<'_, Option<Delivery>>;

	/// Acknowledges a delivery by tag; unacknowledged messages are
	/// redelivered by the broker.
	fn ack(&self, tag: u64) -> BrokerFuture<'_, ()>;
}

/// Outcome of a best-effort publication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
	/// The broker accepted the event.
	Published,
	/// Publication failed; the triggering mutation stands regardless.
	Failed {
		/// Description of the failure, already logged.
		message: String,
	},
}
impl PublishOutcome {
	/// Whether the broker accepted the event.
	pub fn is_published(&self) -> bool {
		matches!(self, Self::Published)
	}
}

/// Publisher side of the event propagator.
///
/// Publication is best-effort by design: coupling the primary mutation to
/// broker availability would turn a broker outage into a write outage, so a
/// failure here is logged and reported in the outcome, never propagated as
/// an error.
#[derive(Clone)]
pub struct EventPublisher {
	broker: Arc<dyn EventBroker>,
}
impl EventPublisher {
	/// Creates a publisher over the broker connection.
	pub fn new(broker: Arc<dyn EventBroker>) -> Self {
		Self { broker }
	}

	/// Publishes a cascading-delete event for `payload`.
	pub async fn publish_cascade_delete(&self, payload: &CascadeDelete) -> PublishOutcome {
		const KIND: OpKind = OpKind::Publish;

		let span = OpSpan::new(KIND, "publish_cascade_delete");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let outcome = span
			.instrument(async move {
				let event = match DomainEvent::cascade_delete(payload) {
					Ok(event) => event,
					Err(e) => return PublishOutcome::Failed { message: e.to_string() },
				};

				match self.broker.publish(&event).await {
					Ok(()) => PublishOutcome::Published,
					Err(e) => PublishOutcome::Failed { message: e.to_string() },
				}
			})
			.await;

		match &outcome {
			PublishOutcome::Published => obs::record_op_outcome(KIND, OpOutcome::Success),
			PublishOutcome::Failed { message } => {
				warn_degraded(
					KIND,
					&format!("cascade publish failed for {}: {message}", payload.parent_id),
				);
				obs::record_op_outcome(KIND, OpOutcome::Failure);
			},
		}

		outcome
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn resource(id: &str) -> ResourceId {
		ResourceId::new(id).expect("Fixture id should be valid.")
	}

	#[test]
	fn cascade_payload_uses_the_camel_case_wire_shape() {
		let payload = CascadeDelete {
			parent_id: resource("post1"),
			dependent_ids: vec![resource("m1"), resource("m2")],
		};
		let event =
			DomainEvent::cascade_delete(&payload).expect("Encoding a fixture payload should succeed.");
		let json: serde_json::Value = serde_json::from_slice(&event.payload)
			.expect("Event payload should be valid JSON.");

		assert_eq!(event.routing_key, POST_DELETED_KEY);
		assert_eq!(json["parentId"], "post1");
		assert_eq!(json["dependentIds"][1], "m2");
	}

	#[test]
	fn decode_reports_the_failing_path() {
		let error = decode_cascade_delete(br#"{"parentId":"p1","dependentIds":[7]}"#)
			.expect_err("Numeric dependent id should fail decoding.");

		assert!(error.path().to_string().contains("dependentIds"));
	}

	#[test]
	fn decode_round_trips_the_publisher_encoding() {
		let payload =
			CascadeDelete { parent_id: resource("post1"), dependent_ids: vec![resource("m1")] };
		let event =
			DomainEvent::cascade_delete(&payload).expect("Encoding a fixture payload should succeed.");
		let decoded =
			decode_cascade_delete(&event.payload).expect("Publisher encoding should decode.");

		assert_eq!(decoded, payload);
	}
}
