// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime, macros::datetime};
// self
use backplane::{
	admission::{
		AdmissionConfig, AdmissionController, AdmissionDecision, PolicyKind, RatePolicy,
		ScopeClass,
	},
	store::MemoryStore,
};

fn controller(config: AdmissionConfig) -> AdmissionController {
	AdmissionController::new(Arc::new(MemoryStore::default()), config)
}

async fn admit(
	controller: &AdmissionController,
	subject: &str,
	scope: ScopeClass,
	now: OffsetDateTime,
) -> AdmissionDecision {
	controller
		.admit_at(subject, scope, now)
		.await
		.expect("Memory-backed admission should not fail.")
}

#[tokio::test]
async fn capacity_three_in_sixty_seconds_rejects_the_fourth() {
	let config = AdmissionConfig {
		global: vec![RatePolicy::fixed_window(Duration::seconds(60), 3)],
		sensitive_write: vec![],
	};
	let controller = controller(config);
	let now = datetime!(2025-11-10 12:00:00 UTC);

	for _ in 0..3 {
		assert!(admit(&controller, "ip1", ScopeClass::Global, now).await.is_allowed());
	}

	match admit(&controller, "ip1", ScopeClass::Global, now).await {
		AdmissionDecision::Reject { policy, retry_after } => {
			assert_eq!(policy, PolicyKind::FixedWindow);

			let delay = retry_after.expect("Live window should produce a retry hint.");

			assert!(delay.is_positive());
			assert!(delay <= Duration::seconds(60));
		},
		AdmissionDecision::Allow => panic!("Fourth request within the window must be rejected."),
	}

	// A fresh window admits again.
	assert!(
		admit(&controller, "ip1", ScopeClass::Global, now + Duration::seconds(61))
			.await
			.is_allowed()
	);
}

#[tokio::test]
async fn default_burst_policy_caps_at_five_per_second() {
	let controller = controller(AdmissionConfig::default());
	let now = datetime!(2025-11-10 12:00:00 UTC);

	for _ in 0..5 {
		assert!(admit(&controller, "ip1", ScopeClass::Global, now).await.is_allowed());
	}

	assert!(!admit(&controller, "ip1", ScopeClass::Global, now).await.is_allowed());
	// Another subject is counted independently.
	assert!(admit(&controller, "ip2", ScopeClass::Global, now).await.is_allowed());
}

#[tokio::test]
async fn sensitive_writes_compose_both_policies() {
	let config = AdmissionConfig {
		global: vec![RatePolicy::token_bucket(Duration::seconds(1), 100)],
		sensitive_write: vec![RatePolicy::fixed_window(Duration::minutes(5), 2)],
	};
	let controller = controller(config);
	let now = datetime!(2025-11-10 12:00:00 UTC);

	for _ in 0..2 {
		assert!(admit(&controller, "u1", ScopeClass::SensitiveWrite, now).await.is_allowed());
	}

	match admit(&controller, "u1", ScopeClass::SensitiveWrite, now).await {
		AdmissionDecision::Reject { policy, .. } => assert_eq!(policy, PolicyKind::FixedWindow),
		AdmissionDecision::Allow =>
			panic!("Third sensitive write within the window must be rejected."),
	}

	// The coarse table does not apply to the global scope.
	for _ in 0..10 {
		assert!(admit(&controller, "u1", ScopeClass::Global, now).await.is_allowed());
	}
}

#[tokio::test]
async fn rejection_maps_to_a_429_with_retry_hint() {
	let config = AdmissionConfig {
		global: vec![RatePolicy::token_bucket(Duration::seconds(1), 1)],
		sensitive_write: vec![],
	};
	let controller = controller(config);
	let now = datetime!(2025-11-10 12:00:00 UTC);

	assert!(admit(&controller, "ip1", ScopeClass::Global, now).await.is_allowed());

	let error = admit(&controller, "ip1", ScopeClass::Global, now)
		.await
		.into_result()
		.expect_err("Second request should be rejected.");

	assert_eq!(error.status(), 429);
	assert_eq!(error.retry_after_secs(), Some(1));
}
