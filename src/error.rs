//! Governor-level error types shared across configuration and lifecycle misuse.

// self
use crate::_prelude::*;

/// Governor-wide result type alias returning [`GovernorError`] by default.
pub type Result<T, E = GovernorError> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// The governor has no I/O of its own, so this error has no transport/storage layer
/// underneath it: just configuration failures and the two strict-mode lifecycle misuses
/// described in the crate's error handling design.
#[derive(Debug, ThisError)]
pub enum GovernorError {
	/// Invalid configuration supplied at construction time.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// `release` was called twice for the same lease id while `strict` mode is enabled.
	#[error("Lease `{lease_id}` was already released.")]
	DoubleRelease {
		/// Lease id that was released more than once.
		lease_id: String,
	},
	/// `release` was called for a lease id the store never issued (or has fully forgotten)
	/// while `strict` mode is enabled.
	#[error("Lease `{lease_id}` is unknown to this governor.")]
	UnknownLease {
		/// Lease id that could not be found.
		lease_id: String,
	},
}

/// Configuration and validation failures raised when building a [`crate::config::GovernorConfig`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// `interactive_reserve` consumes the whole (or more than the whole) concurrency pool.
	#[error(
		"interactive_reserve ({interactive_reserve}) must be less than max_in_flight ({max_in_flight})."
	)]
	InteractiveReserveExceedsCapacity {
		/// Configured hard ceiling.
		max_in_flight: u32,
		/// Configured interactive reserve.
		interactive_reserve: u32,
	},
	/// `max_in_flight` was configured as zero, which can never admit anything.
	#[error("max_in_flight must be at least 1.")]
	ZeroCapacity,
	/// A ratio field (e.g. `soft_cap_ratio`) was outside `(0.0, 1.0]`.
	#[error("{field} must be in (0.0, 1.0], got {value}.")]
	InvalidRatio {
		/// Name of the offending field.
		field: &'static str,
		/// Value that failed validation.
		value: f64,
	},
	/// An EMA factor (`alpha`) was outside `(0.0, 1.0]`.
	#[error("alpha must be in (0.0, 1.0], got {value}.")]
	InvalidAlpha {
		/// Value that failed validation.
		value: f64,
	},
	/// `window_ms` or a TTL/interval field was configured as zero.
	#[error("{field} must be greater than 0.")]
	ZeroDuration {
		/// Name of the offending field.
		field: &'static str,
	},
	/// `min_concurrency` exceeded `max_in_flight`.
	#[error("min_concurrency ({min_concurrency}) must not exceed max_in_flight ({max_in_flight}).")]
	MinConcurrencyExceedsCapacity {
		/// Configured hard ceiling.
		max_in_flight: u32,
		/// Configured adaptive floor.
		min_concurrency: u32,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn config_error_converts_into_governor_error() {
		let config_error = ConfigError::ZeroCapacity;
		let governor_error: GovernorError = config_error.clone().into();

		assert!(matches!(governor_error, GovernorError::Config(_)));
		assert_eq!(governor_error.to_string(), config_error.to_string());
	}

	#[test]
	fn lifecycle_errors_mention_the_lease_id() {
		let error = GovernorError::DoubleRelease { lease_id: "lease-1".into() };

		assert!(error.to_string().contains("lease-1"));
	}
}
