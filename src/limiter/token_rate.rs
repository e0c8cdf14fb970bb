//! Rolling-window sum of token amounts, with post-hoc reconciliation.

// self
use crate::{
	ids::LeaseId,
	limiter::{
		clamp_retry_after_ms,
		rolling_window::{RollingWindow, WindowEntry},
	},
};

struct TokenEntry {
	timestamp: u64,
	tokens: u64,
	lease_id: Option<LeaseId>,
}
impl WindowEntry for TokenEntry {
	fn timestamp(&self) -> u64 {
		self.timestamp
	}
}

/// Denial detail returned by [`TokenRatePool::try_admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenRateDenial {
	/// Retry hint, already clamped to `[25, 5000]` ms.
	pub retry_after_ms: u64,
	/// Tokens currently counted in the window.
	pub current: u64,
	/// Configured cap.
	pub limit: u64,
}

/// Sums token amounts within a rolling window and admits up to a configured cap.
pub struct TokenRatePool {
	window: RollingWindow<TokenEntry>,
	cap: u64,
	sum: u64,
}
impl TokenRatePool {
	/// Creates a new pool with the given cap and window length.
	pub fn new(cap: u64, window_ms: u64) -> Self {
		Self { window: RollingWindow::new(window_ms), cap, sum: 0 }
	}

	fn prune(&mut self, now: u64) {
		for removed in self.window.prune_removed(now) {
			self.sum = self.sum.saturating_sub(removed.tokens);
		}
	}

	/// Two-phase probe: prunes, then reports whether `needed` additional tokens fit.
	///
	/// Does **not** record the charge; callers must call [`Self::record`] only once all
	/// other limiters have also admitted.
	pub fn try_admit(&mut self, now: u64, needed: u64) -> Result<(), TokenRateDenial> {
		self.prune(now);

		if self.sum.saturating_add(needed) > self.cap {
			let surplus = self.sum.saturating_add(needed).saturating_sub(self.cap);
			let retry_after_ms = self.retry_hint_for_surplus(now, surplus);

			return Err(TokenRateDenial { retry_after_ms, current: self.sum, limit: self.cap });
		}

		Ok(())
	}

	/// Finds, oldest-first, the earliest point at which enough tokens will have aged out
	/// to admit `surplus` additional tokens, and returns the retry hint for that point.
	fn retry_hint_for_surplus(&self, now: u64, surplus: u64) -> u64 {
		let mut freed = 0_u64;

		for entry in self.window.iter() {
			freed = freed.saturating_add(entry.tokens);

			if freed >= surplus {
				let until = (entry.timestamp + self.window.window_ms()).saturating_sub(now);

				return clamp_retry_after_ms(until);
			}
		}

		clamp_retry_after_ms(self.window.window_ms())
	}

	/// Records an admitted charge of `tokens` at `now`, optionally tagged with a lease id
	/// for later reconciliation.
	pub fn record(&mut self, now: u64, tokens: u64, lease_id: Option<LeaseId>) {
		self.sum = self.sum.saturating_add(tokens);
		self.window.push(TokenEntry { timestamp: now, tokens, lease_id });
	}

	/// Replaces the estimated charge for `lease_id` with its actual usage.
	///
	/// Searches from the tail (recent entries are more likely to still be tagged and
	/// present). If the entry has already been pruned, this is a silent no-op.
	pub fn reconcile(&mut self, lease_id: &LeaseId, actual_tokens: u64) -> bool {
		for entry in self.window.rev_iter_mut() {
			if entry.lease_id.as_ref() == Some(lease_id) {
				let delta = actual_tokens as i64 - entry.tokens as i64;

				entry.tokens = actual_tokens;
				self.sum = (self.sum as i64 + delta).max(0) as u64;

				return true;
			}
		}

		false
	}

	/// Current summed usage within the window (after the last prune).
	pub fn current_sum(&self) -> u64 {
		self.sum
	}

	/// Configured cap.
	pub fn cap(&self) -> u64 {
		self.cap
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn admits_up_to_cap_then_denies() {
		let mut pool = TokenRatePool::new(1_000, 60_000);

		pool.try_admit(0, 800).expect("First charge should be admitted.");
		pool.record(0, 800, None);

		let denial = pool.try_admit(0, 300).expect_err("800 + 300 exceeds the 1000 cap.");

		assert_eq!(denial.current, 800);
		assert_eq!(denial.limit, 1_000);
	}

	#[test]
	fn reconciliation_replaces_the_estimate() {
		let mut pool = TokenRatePool::new(1_000, 60_000);
		let lease_id = LeaseId::generate();

		pool.record(0, 800, Some(lease_id.clone()));
		assert!(pool.reconcile(&lease_id, 600));
		assert_eq!(pool.current_sum(), 600);

		pool.try_admit(0, 300).expect("600 + 300 fits under the 1000 cap after reconciliation.");
	}

	#[test]
	fn reconciliation_can_increase_usage_above_the_estimate() {
		let mut pool = TokenRatePool::new(1_000, 60_000);
		let lease_id = LeaseId::generate();

		pool.record(0, 200, Some(lease_id.clone()));
		assert!(pool.reconcile(&lease_id, 900));
		assert_eq!(pool.current_sum(), 900);
	}

	#[test]
	fn reconciliation_on_unknown_lease_is_a_no_op() {
		let mut pool = TokenRatePool::new(1_000, 60_000);

		pool.record(0, 100, Some(LeaseId::generate()));

		assert!(!pool.reconcile(&LeaseId::generate(), 50));
		assert_eq!(pool.current_sum(), 100);
	}

	#[test]
	fn retry_hint_targets_the_entry_that_frees_enough_surplus() {
		let mut pool = TokenRatePool::new(100, 1_000);

		pool.record(0, 60, None);
		pool.record(500, 60, None);

		let denial = pool.try_admit(600, 50).expect_err("Current sum (120) leaves no room for 50.");

		// Surplus = 120 + 50 - 100 = 70; freeing the first entry (60) is not enough on its
		// own, so the hint must be based on the *second* entry aging out at t=1500.
		assert_eq!(denial.retry_after_ms, 900);
	}
}
