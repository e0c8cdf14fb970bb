//! Minimal acquire/release loop against a concurrency-limited governor.

use lease_governor::{
	config::{ConcurrencyConfig, GovernorConfig},
	governor::Governor,
	lease::{AcquireRequest, Outcome, ReleaseReport},
};

fn main() {
	#[cfg(feature = "tracing")]
	tracing_subscriber::fmt::init();

	let config = GovernorConfig::builder()
		.concurrency(ConcurrencyConfig::new(4))
		.build()
		.expect("Configuration should be valid.");
	let governor = Governor::new(config);

	let request = AcquireRequest::new("user-42", "chat.completion");

	match governor.acquire(request) {
		lease_governor::events::AcquireDecision::Granted(granted) => {
			println!("Granted lease {} expiring at {}ms.", granted.lease_id, granted.expires_at);

			let report = ReleaseReport { outcome: Some(Outcome::Success), ..Default::default() };

			governor.release(granted.lease_id, Some(report)).expect("Release should succeed.");
		},
		lease_governor::events::AcquireDecision::Denied(denied) => {
			println!(
				"Denied: {} (retry after {}ms) - {}",
				denied.reason, denied.retry_after_ms, denied.recommendation
			);
		},
	}

	governor.dispose();
}
