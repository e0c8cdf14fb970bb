//! Rolling-window counter of requests per unit time.

// self
use crate::limiter::{
	clamp_retry_after_ms,
	rolling_window::{RollingWindow, WindowEntry},
};

struct RequestEntry(u64);
impl WindowEntry for RequestEntry {
	fn timestamp(&self) -> u64 {
		self.0
	}
}

/// Denial detail returned by [`RequestRatePool::try_admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestRateDenial {
	/// Retry hint, already clamped to `[25, 5000]` ms.
	pub retry_after_ms: u64,
	/// Requests currently counted in the window.
	pub current: u64,
	/// Configured cap.
	pub limit: u64,
}

/// Counts requests within a rolling window and admits up to a configured cap.
pub struct RequestRatePool {
	window: RollingWindow<RequestEntry>,
	cap: u32,
}
impl RequestRatePool {
	/// Creates a new pool with the given cap and window length.
	pub fn new(cap: u32, window_ms: u64) -> Self {
		Self { window: RollingWindow::new(window_ms), cap }
	}

	/// Two-phase probe: prunes, then reports whether a new request would be admitted.
	///
	/// Does **not** record the request; callers must call [`Self::record`] only once all
	/// other limiters have also admitted, so a later rejection does not consume budget here.
	pub fn try_admit(&mut self, now: u64) -> Result<(), RequestRateDenial> {
		self.window.prune(now);

		let current = self.window.len() as u64;

		if current >= self.cap as u64 {
			let oldest = self.window.oldest_timestamp().unwrap_or(now);
			let retry_after_ms =
				clamp_retry_after_ms((oldest + self.window.window_ms()).saturating_sub(now));

			return Err(RequestRateDenial { retry_after_ms, current, limit: self.cap as u64 });
		}

		Ok(())
	}

	/// Records an admitted request at `now`.
	pub fn record(&mut self, now: u64) {
		self.window.push(RequestEntry(now));
	}

	/// Current count within the window (after the last prune).
	pub fn current_count(&self) -> u64 {
		self.window.len() as u64
	}

	/// Configured cap.
	pub fn cap(&self) -> u32 {
		self.cap
	}
}
