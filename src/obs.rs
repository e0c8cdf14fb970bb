//! Optional observability helpers for the governor.
//!
//! These sit alongside, and are independent of, the `on_event` callback every
//! [`crate::governor::Governor`] can be configured with: that channel is the structured
//! decision/event model and is always compiled in. This module is purely ambient.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to open a `debug`-level span named `lease_governor.op` around
//!   `acquire`/`release`/reaper-sweep, tagged with the operation name, and to log denials
//!   and warnings at `warn`.
//! - Enable `metrics` to increment `governor_acquire_total` and `governor_deny_total`
//!   (the latter labeled by deny reason).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Governor operations observed by the optional logging/metrics shims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GovernorOp {
	/// `Governor::acquire`.
	Acquire,
	/// `Governor::release`.
	Release,
	/// A reaper sweep.
	Sweep,
}
impl GovernorOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Acquire => "acquire",
			Self::Release => "release",
			Self::Sweep => "sweep",
		}
	}
}
impl Display for GovernorOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
