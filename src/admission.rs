//! Multi-tier request admission control backed by the shared counter store.
//!
//! Every inbound request passes through [`AdmissionController::admit`] before
//! it can consume downstream resources. Each configured policy is evaluated
//! with a single atomic increment-with-TTL against the shared store, so
//! concurrent requests from the same subject across process instances are
//! counted exactly; a read-then-write implementation would overshoot
//! capacity under load and is deliberately impossible through this API.

// self
use crate::{
	_prelude::*,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::SharedStore,
};

/// Key domain prefix for admission counters.
const KEY_DOMAIN: &str = "ratelimit";

/// Which of the two composable policy shapes produced a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
	/// Fine-grained burst policy over a short window (e.g. 5 req/s).
	TokenBucket,
	/// Coarse fixed window for sensitive endpoints (e.g. 50 req/5 min).
	FixedWindow,
}
impl PolicyKind {
	/// Returns a stable label used in keys, envelopes, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			PolicyKind::TokenBucket => "token-bucket",
			PolicyKind::FixedWindow => "fixed-window",
		}
	}
}
impl Display for PolicyKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One declarative rate policy: capacity within a rolling bucket window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicy {
	/// Policy shape, used for reporting which limit tripped.
	pub kind: PolicyKind,
	/// Bucket duration; also the counter TTL.
	pub window: Duration,
	/// Requests admitted per subject per window.
	pub capacity: u64,
}
impl RatePolicy {
	/// Fine-grained burst policy.
	pub const fn token_bucket(window: Duration, capacity: u64) -> Self {
		Self { kind: PolicyKind::TokenBucket, window, capacity }
	}

	/// Coarse fixed-window policy.
	pub const fn fixed_window(window: Duration, capacity: u64) -> Self {
		Self { kind: PolicyKind::FixedWindow, window, capacity }
	}
}

/// Logical endpoint class a request is admitted under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeClass {
	/// Every inbound path.
	Global,
	/// Registration, creation, and other abuse-prone writes.
	SensitiveWrite,
}
impl ScopeClass {
	/// Returns the key segment for this scope.
	pub const fn as_str(self) -> &'static str {
		match self {
			ScopeClass::Global => "global",
			ScopeClass::SensitiveWrite => "sensitive-write",
		}
	}
}
impl Display for ScopeClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Declarative policy tables per endpoint class.
///
/// The global list applies to every request; the sensitive list is applied
/// in addition when the request's scope is [`ScopeClass::SensitiveWrite`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionConfig {
	/// Policies applied to every scope.
	pub global: Vec<RatePolicy>,
	/// Extra policies applied to sensitive writes only.
	pub sensitive_write: Vec<RatePolicy>,
}
impl AdmissionConfig {
	fn policies_for(&self, scope: ScopeClass) -> impl Iterator<Item = &RatePolicy> {
		let extra = match scope {
			ScopeClass::SensitiveWrite => self.sensitive_write.as_slice(),
			ScopeClass::Global => &[],
		};

		self.global.iter().chain(extra)
	}
}
impl Default for AdmissionConfig {
	fn default() -> Self {
		Self {
			global: vec![RatePolicy::token_bucket(Duration::seconds(1), 5)],
			sensitive_write: vec![RatePolicy::fixed_window(Duration::minutes(5), 50)],
		}
	}
}

/// Outcome of an admission check; rejection is expected control flow, not an
/// error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
	/// Request may proceed.
	Allow,
	/// Request exceeded a policy's capacity for the live window.
	Reject {
		/// Policy that tripped.
		policy: PolicyKind,
		/// Time until the live window expires.
		retry_after: Option<Duration>,
	},
}
impl AdmissionDecision {
	/// Whether the request may proceed.
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow)
	}

	/// Converts a rejection into the boundary error for envelope rendering.
	pub fn into_result(self) -> Result<()> {
		match self {
			Self::Allow => Ok(()),
			Self::Reject { policy, retry_after } =>
				Err(Error::AdmissionRejected { policy, retry_after }),
		}
	}
}

/// Enforces per-subject, per-scope request quotas via the shared store.
///
/// A store failure surfaces as `Err`; callers should fail closed (reject the
/// request) so the admission guarantee survives store outages.
#[derive(Clone)]
pub struct AdmissionController {
	store: Arc<dyn SharedStore>,
	config: AdmissionConfig,
}
impl AdmissionController {
	/// Creates a controller over the shared store with the given policy
	/// tables.
	pub fn new(store: Arc<dyn SharedStore>, config: AdmissionConfig) -> Self {
		Self { store, config }
	}

	/// Admits or rejects a request for `(subject, scope)` at the current
	/// instant.
	pub async fn admit(&self, subject: &str, scope: ScopeClass) -> Result<AdmissionDecision> {
		self.admit_at(subject, scope, OffsetDateTime::now_utc()).await
	}

	/// [`Self::admit`] with an explicit clock, so window rollover is testable
	/// without sleeping.
	pub async fn admit_at(
		&self,
		subject: &str,
		scope: ScopeClass,
		now: OffsetDateTime,
	) -> Result<AdmissionDecision> {
		const KIND: OpKind = OpKind::Admission;

		let span = OpSpan::new(KIND, "admit");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				for policy in self.config.policies_for(scope) {
					let key = counter_key(subject, scope, policy, now);
					let slot = self.store.increment(&key, policy.window, now).await?;

					if slot.count > policy.capacity {
						let remaining = slot.expires_at - now;

						return Ok(AdmissionDecision::Reject {
							policy: policy.kind,
							retry_after: (remaining.is_positive()).then_some(remaining),
						});
					}
				}

				Ok(AdmissionDecision::Allow)
			})
			.await;

		obs::record_op_outcome(KIND, OpOutcome::from_result(&result));

		result
	}
}

/// `ratelimit:{subject}:{scope}:{window}` where the window segment pairs the
/// policy's window length with the current bucket index, so two policies on
/// the same scope never share a counter.
fn counter_key(subject: &str, scope: ScopeClass, policy: &RatePolicy, now: OffsetDateTime) -> String {
	let window_secs = policy.window.whole_seconds().max(1);
	let bucket = now.unix_timestamp().div_euclid(window_secs);

	format!("{KEY_DOMAIN}:{subject}:{scope}:{window_secs}-{bucket}")
}
