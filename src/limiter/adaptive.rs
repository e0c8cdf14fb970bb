//! EMA-based feedback loop adjusting the concurrency pool's effective max.

/// Self-tuning controller that nudges `effective_max` by one unit per tick based on
/// observed deny-rate and completion-latency EMAs.
#[derive(Debug)]
pub struct AdaptiveController {
	alpha: f64,
	target_deny_rate: f64,
	latency_threshold: f64,
	adjust_interval_ms: u64,
	min_concurrency: u32,

	last_tick_at: u64,
	attempts: u32,
	denials: u32,
	latency_sum_ms: f64,
	latency_samples: u32,

	ema_deny_rate: f64,
	ema_latency_ms: f64,
	baseline_latency_ms: Option<f64>,
}
impl AdaptiveController {
	/// Creates a new controller anchored to the construction-time clock reading.
	pub fn new(
		alpha: f64,
		target_deny_rate: f64,
		latency_threshold: f64,
		adjust_interval_ms: u64,
		min_concurrency: u32,
		now: u64,
	) -> Self {
		Self {
			alpha,
			target_deny_rate,
			latency_threshold,
			adjust_interval_ms,
			min_concurrency,
			last_tick_at: now,
			attempts: 0,
			denials: 0,
			latency_sum_ms: 0.0,
			latency_samples: 0,
			ema_deny_rate: 0.0,
			ema_latency_ms: 0.0,
			baseline_latency_ms: None,
		}
	}

	/// Records that one `acquire` pass ran through the limiter chain, and whether it was
	/// denied. Counted regardless of which limiter produced the denial.
	pub fn record_attempt(&mut self, denied: bool) {
		self.attempts += 1;

		if denied {
			self.denials += 1;
		}
	}

	/// Records a completion latency sample, fed in from `release`.
	pub fn record_latency(&mut self, latency_ms: u64) {
		self.latency_sum_ms += latency_ms as f64;
		self.latency_samples += 1;
	}

	/// Runs the tick if `adjust_interval_ms` has elapsed since the last one, and returns
	/// the (possibly unchanged) effective max the concurrency pool should apply.
	///
	/// `current_effective_max` and `max_weight` are supplied by the caller because the
	/// controller does not own the concurrency pool; it only recommends adjustments to it.
	pub fn maybe_adjust(&mut self, now: u64, current_effective_max: u32, max_weight: u32) -> u32 {
		if now.saturating_sub(self.last_tick_at) < self.adjust_interval_ms {
			return current_effective_max;
		}

		let interval_deny_rate =
			if self.attempts > 0 { self.denials as f64 / self.attempts as f64 } else { 0.0 };

		self.ema_deny_rate = self.alpha * interval_deny_rate + (1.0 - self.alpha) * self.ema_deny_rate;

		if self.latency_samples > 0 {
			let interval_avg_latency = self.latency_sum_ms / self.latency_samples as f64;

			self.ema_latency_ms =
				self.alpha * interval_avg_latency + (1.0 - self.alpha) * self.ema_latency_ms;

			if self.baseline_latency_ms.is_none() {
				self.baseline_latency_ms = Some(self.ema_latency_ms);
			}
		}

		let latency_breached = self
			.baseline_latency_ms
			.is_some_and(|baseline| self.ema_latency_ms > baseline * self.latency_threshold);
		let latency_calm = self
			.baseline_latency_ms
			.is_none_or(|baseline| self.ema_latency_ms <= baseline * 1.1);

		let new_effective_max = if self.ema_deny_rate > self.target_deny_rate || latency_breached {
			current_effective_max.saturating_sub(1).max(self.min_concurrency)
		} else if current_effective_max < max_weight
			&& self.ema_deny_rate < self.target_deny_rate / 2.0
			&& latency_calm
		{
			current_effective_max + 1
		} else {
			current_effective_max
		};

		self.attempts = 0;
		self.denials = 0;
		self.latency_sum_ms = 0.0;
		self.latency_samples = 0;
		self.last_tick_at = now;

		new_effective_max
	}

	/// Current deny-rate EMA, exposed for snapshots/diagnostics.
	pub fn ema_deny_rate(&self) -> f64 {
		self.ema_deny_rate
	}

	/// Current latency EMA, exposed for snapshots/diagnostics.
	pub fn ema_latency_ms(&self) -> f64 {
		self.ema_latency_ms
	}

	/// Configured floor the controller will never reduce `effective_max` below.
	pub fn min_concurrency(&self) -> u32 {
		self.min_concurrency
	}
}
