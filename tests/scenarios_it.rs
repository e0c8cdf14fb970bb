//! Black-box scenario tests driving the public `Governor` facade only, never reaching into
//! limiter internals. No test depends on wall-clock timing; every timestamp is advanced
//! through a `ManualClock`.

use std::sync::Arc;

use lease_governor::{
	clock::ManualClock,
	config::{AdaptiveConfig, ConcurrencyConfig, FairnessConfig, GovernorConfig, RateConfig},
	events::{AcquireDecision, DenyReason},
	governor::Governor,
	lease::{AcquireRequest, Estimate, Priority, ReleaseReport, TokenUsage},
};

fn granted_id(decision: &AcquireDecision) -> lease_governor::ids::LeaseId {
	decision.lease_id().cloned().expect("Expected a granted decision.")
}

fn assert_denied(decision: &AcquireDecision, reason: DenyReason) {
	match decision {
		AcquireDecision::Denied(denied) => assert_eq!(denied.reason, reason),
		AcquireDecision::Granted(_) => panic!("Expected a denial with reason {reason:?}."),
	}
}

// S1 — Concurrency denial and recovery.
#[test]
fn concurrency_denies_then_recovers_after_release() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(1))
		.lease_ttl_ms(1_000)
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	clock.set(0);
	let first = gov.acquire(AcquireRequest::new("actor-1", "chat.completion"));
	assert!(first.is_granted());
	let granted = match &first {
		AcquireDecision::Granted(granted) => granted.clone(),
		_ => unreachable!(),
	};
	assert_eq!(granted.expires_at, 1_000);

	clock.set(10);
	let second = gov.acquire(AcquireRequest::new("actor-1", "chat.completion"));
	match second {
		AcquireDecision::Denied(denied) => {
			assert_eq!(denied.reason, DenyReason::Concurrency);
			assert_eq!(denied.retry_after_ms, 990);
		},
		AcquireDecision::Granted(_) => panic!("Expected a concurrency denial."),
	}

	clock.set(500);
	gov.release(granted.lease_id, None).unwrap();

	clock.set(501);
	let third = gov.acquire(AcquireRequest::new("actor-1", "chat.completion"));
	assert!(third.is_granted());

	gov.dispose();
}

// S2 — Rate window slide.
#[test]
fn request_rate_window_slides() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.rate(RateConfig { requests_per_minute: Some(2), tokens_per_minute: None, window_ms: 1_000 })
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	clock.set(0);
	assert!(gov.acquire(AcquireRequest::new("actor-1", "poll")).is_granted());

	clock.set(100);
	assert!(gov.acquire(AcquireRequest::new("actor-1", "poll")).is_granted());

	clock.set(200);
	let third = gov.acquire(AcquireRequest::new("actor-1", "poll"));
	assert_denied(&third, DenyReason::Rate);

	clock.set(1_050);
	let fourth = gov.acquire(AcquireRequest::new("actor-1", "poll"));
	assert!(fourth.is_granted(), "The request at t=0 should have aged out of the window by t=1050.");

	gov.dispose();
}

// S3 — Token reconciliation.
#[test]
fn token_rate_reconciles_on_release() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.rate(RateConfig { requests_per_minute: None, tokens_per_minute: Some(1_000), window_ms: 60_000 })
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let first_request = AcquireRequest::new("actor-1", "completion").with_estimate(Estimate {
		weight: None,
		prompt_tokens: 500,
		max_output_tokens: 300,
	});
	let first = gov.acquire(first_request);
	assert!(first.is_granted());
	let lease_id = granted_id(&first);

	let second_request = AcquireRequest::new("actor-1", "completion").with_estimate(Estimate {
		weight: None,
		prompt_tokens: 100,
		max_output_tokens: 200,
	});
	let second = gov.acquire(second_request);
	assert_denied(&second, DenyReason::Rate);

	let report = ReleaseReport {
		usage: Some(TokenUsage { prompt_tokens: 500, output_tokens: 100 }),
		..Default::default()
	};
	gov.release(lease_id, Some(report)).unwrap();

	let third_request = AcquireRequest::new("actor-1", "completion").with_estimate(Estimate {
		weight: None,
		prompt_tokens: 100,
		max_output_tokens: 200,
	});
	let third = gov.acquire(third_request);
	assert!(third.is_granted(), "600 (reconciled) + 300 = 900 should fit under the 1000 cap.");

	gov.dispose();
}

// S4 — Fairness soft cap.
#[test]
fn fairness_soft_cap_blocks_the_hog_but_not_other_actors() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(10))
		.fairness(FairnessConfig { soft_cap_ratio: 0.5, starvation_window_ms: 5_000 })
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	for _ in 0..5 {
		let decision = gov.acquire(AcquireRequest::new("actor-a", "bulk.export"));
		assert!(decision.is_granted());
	}

	let sixth = gov.acquire(AcquireRequest::new("actor-a", "bulk.export"));
	assert_denied(&sixth, DenyReason::Policy);

	let other = gov.acquire(AcquireRequest::new("actor-b", "bulk.export"));
	assert!(other.is_granted(), "A different actor should not be penalized by actor-a's soft cap.");

	gov.dispose();
}

// S5 — Rollback on later-limiter denial.
#[test]
fn rate_denial_rolls_back_the_concurrency_reservation() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(10))
		.rate(RateConfig { requests_per_minute: Some(1), tokens_per_minute: None, window_ms: 60_000 })
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let first = gov.acquire(AcquireRequest::new("actor-1", "chat.completion"));
	assert!(first.is_granted());

	let second = gov.acquire(AcquireRequest::new("actor-2", "chat.completion"));
	assert_denied(&second, DenyReason::Rate);

	let snapshot = gov.snapshot();
	assert_eq!(
		snapshot.concurrency.unwrap().in_flight_weight,
		1,
		"Only the granted request's weight should remain reserved."
	);

	gov.dispose();
}

// S6 — Weighted concurrency.
#[test]
fn weighted_concurrency_tracks_the_sum_of_weights() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(10))
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let heavy = |actor: &str| {
		AcquireRequest::new(actor, "batch.job")
			.with_estimate(Estimate { weight: Some(5), prompt_tokens: 0, max_output_tokens: 0 })
	};

	assert!(gov.acquire(heavy("actor-1")).is_granted());
	assert!(gov.acquire(heavy("actor-2")).is_granted());

	let light = AcquireRequest::new("actor-3", "batch.job")
		.with_estimate(Estimate { weight: Some(1), prompt_tokens: 0, max_output_tokens: 0 });
	let third = gov.acquire(light);
	assert_denied(&third, DenyReason::Concurrency);

	gov.dispose();
}

// S7 — Adaptive reduction.
#[test]
fn adaptive_controller_reduces_effective_max_under_sustained_denials() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(5))
		.adaptive(AdaptiveConfig {
			alpha: 1.0,
			target_deny_rate: 0.05,
			latency_threshold: 1.5,
			adjust_interval_ms: 100,
			min_concurrency: 1,
		})
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	for i in 0..5 {
		assert!(gov.acquire(AcquireRequest::new(format!("actor-{i}"), "call")).is_granted());
	}

	for _ in 0..20 {
		assert_denied(
			&gov.acquire(AcquireRequest::new("actor-overflow", "call")),
			DenyReason::Concurrency,
		);
	}

	clock.advance(150);

	// The next acquire's pre-admission tick observes the interval elapsed and the
	// accumulated deny rate, and lowers `effective_max` before trying to admit.
	let tick_trigger = gov.acquire(AcquireRequest::new("actor-overflow", "call"));
	assert_denied(&tick_trigger, DenyReason::Concurrency);

	let snapshot = gov.snapshot();
	assert_eq!(
		snapshot.concurrency.unwrap().effective_max,
		4,
		"A sustained deny rate above target should reduce effective_max by one unit."
	);

	gov.dispose();
}

// Background-reserve protection (boundary property).
#[test]
fn background_priority_is_denied_once_only_the_reserve_remains() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(10).with_interactive_reserve(2))
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let heavy = AcquireRequest::new("actor-1", "call")
		.with_estimate(Estimate { weight: Some(8), prompt_tokens: 0, max_output_tokens: 0 });
	assert!(gov.acquire(heavy).is_granted());

	let background =
		AcquireRequest::new("actor-2", "call").with_priority(Priority::Background);
	assert_denied(&gov.acquire(background), DenyReason::Concurrency);

	let interactive =
		AcquireRequest::new("actor-3", "call").with_priority(Priority::Interactive);
	assert!(gov.acquire(interactive).is_granted(), "Interactive requests may consume the reserve.");

	gov.dispose();
}

// Idempotency (universal invariant 6).
#[test]
fn idempotent_requests_share_one_lease_and_free_capacity_once() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(1))
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let request = AcquireRequest::new("actor-1", "call").with_idempotency_key("req-1");
	let first = gov.acquire(request.clone());
	let second = gov.acquire(request);

	assert_eq!(first.lease_id(), second.lease_id());
	assert_eq!(gov.snapshot().concurrency.unwrap().in_flight_weight, 1);

	gov.release(granted_id(&first), None).unwrap();
	assert_eq!(gov.snapshot().concurrency.unwrap().in_flight_weight, 0);

	gov.dispose();
}

// Released lease ids never re-appear (universal invariant 7).
#[test]
fn a_released_lease_id_is_unknown_afterwards_in_strict_mode() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(1))
		.reaper_interval_ms(10_000)
		.strict(true)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	let first = gov.acquire(AcquireRequest::new("actor-1", "call"));
	let lease_id = granted_id(&first);

	gov.release(lease_id.clone(), None).unwrap();

	assert!(matches!(
		gov.release(lease_id, None),
		Err(lease_governor::error::GovernorError::DoubleRelease { .. })
	));

	gov.dispose();
}

// retry_after_ms clamping (universal invariant 4).
#[test]
fn retry_after_ms_is_always_clamped_into_range() {
	let clock = Arc::new(ManualClock::new());
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(1))
		.lease_ttl_ms(1_000_000)
		.reaper_interval_ms(10_000)
		.build()
		.unwrap();
	let gov = Governor::with_clock(config, clock.clone());

	assert!(gov.acquire(AcquireRequest::new("actor-1", "call")).is_granted());

	let denied = gov.acquire(AcquireRequest::new("actor-2", "call"));

	match denied {
		AcquireDecision::Denied(denied) => {
			assert!(denied.retry_after_ms >= 25 && denied.retry_after_ms <= 5_000);
		},
		AcquireDecision::Granted(_) => panic!("Expected a denial."),
	}

	gov.dispose();
}
