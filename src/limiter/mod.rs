//! The four independent admission limiters composed by the governor facade.

pub mod adaptive;
pub mod concurrency;
pub mod fairness;
pub mod request_rate;
pub mod token_rate;

mod rolling_window;

pub use adaptive::AdaptiveController;
pub use concurrency::{ConcurrencyDenial, ConcurrencyPool};
pub use fairness::FairnessTracker;
pub use request_rate::RequestRatePool;
pub use token_rate::TokenRatePool;

const MIN_RETRY_AFTER_MS: u64 = 25;
const MAX_RETRY_AFTER_MS: u64 = 5_000;

/// Clamps a retry hint to the `[25, 5000]` ms range every denial must respect.
pub(crate) fn clamp_retry_after_ms(candidate_ms: u64) -> u64 {
	candidate_ms.clamp(MIN_RETRY_AFTER_MS, MAX_RETRY_AFTER_MS)
}
