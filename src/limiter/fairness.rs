//! Per-actor weight accounting with a pressure-gated soft cap and anti-starvation pass.

// std
use std::collections::HashMap;

/// Tracks each actor's in-flight weight and the last time it was denied, and decides
/// whether a new request from that actor should be blocked on fairness grounds.
#[derive(Debug)]
pub struct FairnessTracker {
	soft_cap_ratio: f64,
	starvation_window_ms: u64,
	actor_weight: HashMap<String, u32>,
	last_denial_at: HashMap<String, u64>,
}
impl FairnessTracker {
	/// Creates a new tracker with the given soft-cap ratio and starvation window.
	pub fn new(soft_cap_ratio: f64, starvation_window_ms: u64) -> Self {
		Self {
			soft_cap_ratio,
			starvation_window_ms,
			actor_weight: HashMap::new(),
			last_denial_at: HashMap::new(),
		}
	}

	/// Decides whether `actor_id`'s request for `request_weight` should be blocked.
	///
	/// Enforcement only applies while the pool is under pressure
	/// (`in_flight_weight >= 0.5 * max_weight`). An actor denied within the last
	/// `starvation_window_ms` is granted a one-shot exemption, consumed by this call.
	pub fn is_blocked(
		&mut self,
		actor_id: &str,
		request_weight: u32,
		in_flight_weight: u32,
		max_weight: u32,
		now: u64,
	) -> bool {
		let under_pressure = in_flight_weight as f64 >= 0.5 * max_weight as f64;

		if !under_pressure {
			return false;
		}

		let current = self.actor_weight.get(actor_id).copied().unwrap_or(0);
		let projected = current as f64 + request_weight as f64;

		if projected <= self.soft_cap_ratio * max_weight as f64 {
			return false;
		}

		if let Some(denied_at) = self.last_denial_at.get(actor_id).copied() {
			if now.saturating_sub(denied_at) <= self.starvation_window_ms {
				self.last_denial_at.remove(actor_id);

				return false;
			}
		}

		true
	}

	/// Records that `actor_id` acquired `weight` more in-flight weight.
	pub fn record_acquire(&mut self, actor_id: &str, weight: u32) {
		*self.actor_weight.entry(actor_id.to_owned()).or_insert(0) += weight;
	}

	/// Records that `actor_id` released `weight` of in-flight weight.
	pub fn record_release(&mut self, actor_id: &str, weight: u32) {
		if let Some(current) = self.actor_weight.get_mut(actor_id) {
			*current = current.saturating_sub(weight);

			if *current == 0 {
				self.actor_weight.remove(actor_id);
			}
		}
	}

	/// Records that `actor_id` was denied at `now`, for future anti-starvation exemption.
	pub fn record_denial(&mut self, actor_id: &str, now: u64) {
		self.last_denial_at.insert(actor_id.to_owned(), now);
	}

	/// Current in-flight weight tracked for `actor_id`.
	pub fn actor_weight(&self, actor_id: &str) -> u32 {
		self.actor_weight.get(actor_id).copied().unwrap_or(0)
	}

	/// Sum of in-flight weight across every tracked actor.
	pub fn total_weight(&self) -> u32 {
		self.actor_weight.values().sum()
	}
}
