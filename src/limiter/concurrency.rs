//! Weighted concurrency pool with an interactive-reserve carve-out.

// self
use crate::{error::ConfigError, lease::Priority, limiter::clamp_retry_after_ms};

/// Denial detail returned by [`ConcurrencyPool::try_admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConcurrencyDenial {
	/// In-flight weight at the moment of denial.
	pub in_flight: u32,
	/// Effective ceiling at the moment of denial.
	pub max_in_flight: u32,
}

/// Weighted capacity pool: a hard ceiling, an adjustable effective ceiling, and a
/// carve-out of weight units background-priority requests may never consume.
#[derive(Clone, Copy, Debug)]
pub struct ConcurrencyPool {
	max_weight: u32,
	effective_max: u32,
	interactive_reserve: u32,
	in_flight_weight: u32,
}
impl ConcurrencyPool {
	/// Creates a new pool at full effective capacity.
	///
	/// Rejects configurations where `interactive_reserve >= max_weight`, mirroring the
	/// validation [`crate::config::GovernorConfig`] performs at construction time.
	pub fn new(max_weight: u32, interactive_reserve: u32) -> Result<Self, ConfigError> {
		if max_weight == 0 {
			return Err(ConfigError::ZeroCapacity);
		}
		if interactive_reserve >= max_weight {
			return Err(ConfigError::InteractiveReserveExceedsCapacity {
				max_in_flight: max_weight,
				interactive_reserve,
			});
		}

		Ok(Self { max_weight, effective_max: max_weight, interactive_reserve, in_flight_weight: 0 })
	}

	/// Attempts to admit a request of the given weight and priority.
	///
	/// On success, `weight` is already reserved in `in_flight_weight`. On failure, no
	/// state changed (invariant 6: a denied acquire makes no net change).
	pub fn try_admit(&mut self, weight: u32, priority: Priority) -> Result<(), ConcurrencyDenial> {
		let available = self.effective_max.saturating_sub(self.in_flight_weight);

		if available < weight {
			return Err(self.denial());
		}
		if priority == Priority::Background && available - weight < self.interactive_reserve {
			return Err(self.denial());
		}

		self.in_flight_weight += weight;

		Ok(())
	}

	/// Releases previously reserved weight back to the pool. Clamped at zero; an
	/// over-release (more weight released than was ever reserved) cannot go negative.
	pub fn release(&mut self, weight: u32) {
		self.in_flight_weight = self.in_flight_weight.saturating_sub(weight);
	}

	/// Clamps and applies a new effective max, as adjusted by the adaptive controller.
	pub fn set_effective_max(&mut self, candidate: u32, min_concurrency: u32) {
		self.effective_max = candidate.clamp(min_concurrency.max(1), self.max_weight);
	}

	/// Computes a retry hint, preferring the precise TTL-based hint when available.
	pub fn retry_after_ms(&self, now: u64, earliest_expiry: Option<u64>) -> u64 {
		if let Some(expiry) = earliest_expiry {
			let until = expiry.saturating_sub(now);

			if until > 0 {
				return clamp_retry_after_ms(until);
			}
		}

		let pressure = self.in_flight_weight as f64 / self.effective_max as f64;
		let heuristic = (250.0 + pressure * 750.0).round() as u64;

		clamp_retry_after_ms(heuristic)
	}

	/// Current in-flight weight.
	pub fn in_flight_weight(&self) -> u32 {
		self.in_flight_weight
	}

	/// Current effective ceiling.
	pub fn effective_max(&self) -> u32 {
		self.effective_max
	}

	/// Configured hard ceiling.
	pub fn max_weight(&self) -> u32 {
		self.max_weight
	}

	/// Configured interactive reserve.
	pub fn interactive_reserve(&self) -> u32 {
		self.interactive_reserve
	}

	fn denial(&self) -> ConcurrencyDenial {
		ConcurrencyDenial { in_flight: self.in_flight_weight, max_in_flight: self.effective_max }
	}
}
