// self
use crate::events::DenyReason;

/// Increments `governor_acquire_total` via the global metrics recorder (when enabled).
pub fn record_acquire() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("governor_acquire_total").increment(1);
	}
}

/// Increments `governor_deny_total`, labeled by reason, via the global metrics recorder
/// (when enabled).
pub fn record_deny(reason: DenyReason) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("governor_deny_total", "reason" => reason.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}
