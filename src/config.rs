//! Governor configuration: a plain data record assembled through a validating builder.

// self
use crate::{_prelude::*, error::ConfigError, events::GovernorEvent};

const DEFAULT_WINDOW_MS: u64 = 60_000;
const DEFAULT_LEASE_TTL_MS: u64 = 60_000;
const DEFAULT_REAPER_INTERVAL_MS: u64 = 5_000;
const DEFAULT_SOFT_CAP_RATIO: f64 = 0.6;
const DEFAULT_STARVATION_WINDOW_MS: u64 = 5_000;
const DEFAULT_ALPHA: f64 = 0.2;
const DEFAULT_TARGET_DENY_RATE: f64 = 0.05;
const DEFAULT_LATENCY_THRESHOLD: f64 = 1.5;
const DEFAULT_ADJUST_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MIN_CONCURRENCY: u32 = 1;

/// Callback invoked inline, under the governor's lock, for every emitted event.
///
/// Panics raised by the callback are caught at the call site and discarded; see the
/// event-handler isolation note in the crate's concurrency design.
pub type EventSink = Box<dyn Fn(&GovernorEvent) + Send + Sync>;

/// Weighted-concurrency pool configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
	/// Hard ceiling on in-flight weight.
	pub max_in_flight: u32,
	/// Weight units that background-priority requests may never consume.
	pub interactive_reserve: u32,
}
impl ConcurrencyConfig {
	/// Creates a configuration with no interactive reserve.
	pub fn new(max_in_flight: u32) -> Self {
		Self { max_in_flight, interactive_reserve: 0 }
	}

	/// Sets the interactive reserve.
	pub fn with_interactive_reserve(mut self, interactive_reserve: u32) -> Self {
		self.interactive_reserve = interactive_reserve;

		self
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.max_in_flight == 0 {
			return Err(ConfigError::ZeroCapacity);
		}
		if self.interactive_reserve >= self.max_in_flight {
			return Err(ConfigError::InteractiveReserveExceedsCapacity {
				max_in_flight: self.max_in_flight,
				interactive_reserve: self.interactive_reserve,
			});
		}

		Ok(())
	}
}

/// Rolling-window rate-limit configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfig {
	/// Cap on requests per window, if request-rate limiting is enabled.
	pub requests_per_minute: Option<u32>,
	/// Cap on summed tokens per window, if token-rate limiting is enabled.
	pub tokens_per_minute: Option<u64>,
	/// Rolling window length, in ms.
	pub window_ms: u64,
}
impl Default for RateConfig {
	fn default() -> Self {
		Self { requests_per_minute: None, tokens_per_minute: None, window_ms: DEFAULT_WINDOW_MS }
	}
}
impl RateConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if self.window_ms == 0 {
			return Err(ConfigError::ZeroDuration { field: "rate.window_ms" });
		}

		Ok(())
	}
}

/// Per-actor fairness configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FairnessConfig {
	/// Fraction of `max_weight` a single actor may hold while the pool is under pressure.
	pub soft_cap_ratio: f64,
	/// Window after a denial during which the actor gets a one-shot soft-cap exemption.
	pub starvation_window_ms: u64,
}
impl Default for FairnessConfig {
	fn default() -> Self {
		Self {
			soft_cap_ratio: DEFAULT_SOFT_CAP_RATIO,
			starvation_window_ms: DEFAULT_STARVATION_WINDOW_MS,
		}
	}
}
impl FairnessConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		if !(self.soft_cap_ratio > 0.0 && self.soft_cap_ratio <= 1.0) {
			return Err(ConfigError::InvalidRatio {
				field: "fairness.soft_cap_ratio",
				value: self.soft_cap_ratio,
			});
		}

		Ok(())
	}
}

/// Adaptive effective-max controller configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveConfig {
	/// EMA smoothing factor applied to both deny-rate and latency samples.
	pub alpha: f64,
	/// Deny rate the controller tries to stay at or below.
	pub target_deny_rate: f64,
	/// Multiple of the baseline latency that triggers a reduction.
	pub latency_threshold: f64,
	/// Minimum interval between adjustments, in ms.
	pub adjust_interval_ms: u64,
	/// Floor the controller will never reduce `effective_max` below.
	pub min_concurrency: u32,
}
impl Default for AdaptiveConfig {
	fn default() -> Self {
		Self {
			alpha: DEFAULT_ALPHA,
			target_deny_rate: DEFAULT_TARGET_DENY_RATE,
			latency_threshold: DEFAULT_LATENCY_THRESHOLD,
			adjust_interval_ms: DEFAULT_ADJUST_INTERVAL_MS,
			min_concurrency: DEFAULT_MIN_CONCURRENCY,
		}
	}
}
impl AdaptiveConfig {
	fn validate(&self, max_in_flight: u32) -> Result<(), ConfigError> {
		if !(self.alpha > 0.0 && self.alpha <= 1.0) {
			return Err(ConfigError::InvalidAlpha { value: self.alpha });
		}
		if self.adjust_interval_ms == 0 {
			return Err(ConfigError::ZeroDuration { field: "adaptive.adjust_interval_ms" });
		}
		if self.min_concurrency == 0 {
			return Err(ConfigError::ZeroCapacity);
		}
		if self.min_concurrency > max_in_flight {
			return Err(ConfigError::MinConcurrencyExceedsCapacity {
				max_in_flight,
				min_concurrency: self.min_concurrency,
			});
		}

		Ok(())
	}
}

/// Fully validated governor configuration produced by [`GovernorConfigBuilder::build`].
pub struct GovernorConfig {
	/// Weighted-concurrency configuration, if concurrency admission is enabled.
	pub concurrency: Option<ConcurrencyConfig>,
	/// Rate-limit configuration; request-rate and token-rate are independently optional
	/// within it.
	pub rate: RateConfig,
	/// Fairness configuration, if per-actor fairness is enabled.
	pub fairness: Option<FairnessConfig>,
	/// Adaptive-controller configuration, if self-tuning is enabled.
	pub adaptive: Option<AdaptiveConfig>,
	/// Time-to-live for a granted lease, in ms.
	pub lease_ttl_ms: u64,
	/// Interval between reaper sweeps, in ms.
	pub reaper_interval_ms: u64,
	/// Whether lifecycle misuse (double release, unknown lease) is a hard error.
	pub strict: bool,
	/// Optional sink invoked for every emitted event.
	pub on_event: Option<EventSink>,
}
impl Debug for GovernorConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GovernorConfig")
			.field("concurrency", &self.concurrency)
			.field("rate", &self.rate)
			.field("fairness", &self.fairness)
			.field("adaptive", &self.adaptive)
			.field("lease_ttl_ms", &self.lease_ttl_ms)
			.field("reaper_interval_ms", &self.reaper_interval_ms)
			.field("strict", &self.strict)
			.field("on_event", &self.on_event.is_some())
			.finish()
	}
}
impl GovernorConfig {
	/// Starts a new builder.
	pub fn builder() -> GovernorConfigBuilder {
		GovernorConfigBuilder::default()
	}
}

/// Validating builder for [`GovernorConfig`].
#[derive(Default)]
pub struct GovernorConfigBuilder {
	concurrency: Option<ConcurrencyConfig>,
	rate: RateConfig,
	fairness: Option<FairnessConfig>,
	adaptive: Option<AdaptiveConfig>,
	lease_ttl_ms: Option<u64>,
	reaper_interval_ms: Option<u64>,
	strict: bool,
	on_event: Option<EventSink>,
}
impl GovernorConfigBuilder {
	/// Enables weighted concurrency admission.
	pub fn concurrency(mut self, concurrency: ConcurrencyConfig) -> Self {
		self.concurrency = Some(concurrency);

		self
	}

	/// Sets the rate-limit configuration (request-rate and/or token-rate).
	pub fn rate(mut self, rate: RateConfig) -> Self {
		self.rate = rate;

		self
	}

	/// Enables fairness with the provided configuration.
	pub fn fairness(mut self, fairness: FairnessConfig) -> Self {
		self.fairness = Some(fairness);

		self
	}

	/// Enables fairness with default soft-cap settings.
	pub fn fairness_enabled(self) -> Self {
		self.fairness(FairnessConfig::default())
	}

	/// Enables the adaptive controller with the provided configuration.
	pub fn adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
		self.adaptive = Some(adaptive);

		self
	}

	/// Enables the adaptive controller with its default tuning.
	pub fn adaptive_enabled(self) -> Self {
		self.adaptive(AdaptiveConfig::default())
	}

	/// Sets the lease TTL, in ms. Defaults to 60 000.
	pub fn lease_ttl_ms(mut self, ttl_ms: u64) -> Self {
		self.lease_ttl_ms = Some(ttl_ms);

		self
	}

	/// Sets the reaper sweep interval, in ms. Defaults to 5 000.
	pub fn reaper_interval_ms(mut self, interval_ms: u64) -> Self {
		self.reaper_interval_ms = Some(interval_ms);

		self
	}

	/// Enables strict mode (double-release/unknown-lease become hard errors).
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;

		self
	}

	/// Registers an event sink.
	pub fn on_event(mut self, sink: impl Fn(&GovernorEvent) + Send + Sync + 'static) -> Self {
		self.on_event = Some(Box::new(sink));

		self
	}

	/// Validates the accumulated configuration and produces a [`GovernorConfig`].
	///
	/// `fairness`/`adaptive` are ignored (dropped silently, not an error) when no
	/// `concurrency` configuration is present, since both police or adjust a concurrency
	/// pool that would not exist.
	pub fn build(self) -> Result<GovernorConfig, ConfigError> {
		if let Some(concurrency) = &self.concurrency {
			concurrency.validate()?;
		}
		self.rate.validate()?;

		let fairness = match (self.fairness, &self.concurrency) {
			(Some(fairness), Some(_)) => {
				fairness.validate()?;

				Some(fairness)
			},
			_ => None,
		};
		let adaptive = match (self.adaptive, &self.concurrency) {
			(Some(adaptive), Some(concurrency)) => {
				adaptive.validate(concurrency.max_in_flight)?;

				Some(adaptive)
			},
			_ => None,
		};

		let lease_ttl_ms = self.lease_ttl_ms.unwrap_or(DEFAULT_LEASE_TTL_MS);
		if lease_ttl_ms == 0 {
			return Err(ConfigError::ZeroDuration { field: "lease_ttl_ms" });
		}

		let reaper_interval_ms = self.reaper_interval_ms.unwrap_or(DEFAULT_REAPER_INTERVAL_MS);
		if reaper_interval_ms == 0 {
			return Err(ConfigError::ZeroDuration { field: "reaper_interval_ms" });
		}

		Ok(GovernorConfig {
			concurrency: self.concurrency,
			rate: self.rate,
			fairness,
			adaptive,
			lease_ttl_ms,
			reaper_interval_ms,
			strict: self.strict,
			on_event: self.on_event,
		})
	}
}
