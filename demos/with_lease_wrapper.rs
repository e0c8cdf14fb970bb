//! An RAII-style `with_lease` wrapper built externally on top of the core facade.
//!
//! The core deliberately stops at `acquire`/`release`; call-site ergonomics like
//! "run this closure and release automatically" are left to callers, because the right
//! shape depends on whether the caller is sync, async, fallible, etc. This demo shows
//! one reasonable shape for a synchronous caller.

use std::time::Instant;

use lease_governor::{
	config::{ConcurrencyConfig, FairnessConfig, GovernorConfig},
	events::AcquireDecision,
	governor::Governor,
	lease::{AcquireRequest, Outcome, ReleaseReport},
};

/// Runs `work` under a lease acquired for `request`, releasing it with the outcome and
/// wall-clock latency the closure actually took. Returns `None` if the request was denied.
fn with_lease<T>(
	governor: &Governor,
	request: AcquireRequest,
	work: impl FnOnce() -> Result<T, ()>,
) -> Option<T> {
	let granted = match governor.acquire(request) {
		AcquireDecision::Granted(granted) => granted,
		AcquireDecision::Denied(denied) => {
			eprintln!("acquire denied: {} - {}", denied.reason, denied.recommendation);

			return None;
		},
	};

	let started_at = Instant::now();
	let result = work();
	let latency_ms = started_at.elapsed().as_millis() as u64;
	let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Error };
	let report = ReleaseReport { outcome: Some(outcome), latency_ms: Some(latency_ms), ..Default::default() };

	governor
		.release(granted.lease_id, Some(report))
		.expect("The lease we just acquired should still be ours to release.");

	result.ok()
}

fn main() {
	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(8).with_interactive_reserve(2))
		.fairness(FairnessConfig::default())
		.build()
		.expect("Configuration should be valid.");
	let governor = Governor::new(config);

	for i in 0..3 {
		let request = AcquireRequest::new("worker-pool", format!("job-{i}"));
		let outcome = with_lease(&governor, request, || {
			println!("running job-{i}");

			Ok::<_, ()>(i * 2)
		});

		println!("job-{i} result: {outcome:?}");
	}

	governor.dispose();
}
