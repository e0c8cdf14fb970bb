//! The facade composing the lease store and the four limiters into one `acquire`/`release`
//! contract.

// std
use std::panic::{self, AssertUnwindSafe};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	config::GovernorConfig,
	events::{AcquireDecision, Denied, DenyReason, Granted, GovernorEvent, LimitsHint},
	ids::LeaseId,
	lease::{AcquireRequest, Lease, ReleaseReport},
	limiter::{AdaptiveController, ConcurrencyPool, FairnessTracker, RequestRatePool, TokenRatePool},
	obs::{self, GovernorOp, OpSpan},
	store::{LeaseStore, Reaper},
};

/// Upper bound on the recently-released set used for strict-mode double-release detection.
const RECENTLY_RELEASED_CAPACITY: usize = 10_000;

struct LastDeny {
	reason: DenyReason,
	timestamp: u64,
	actor_id: String,
}

struct State {
	store: LeaseStore,
	concurrency: Option<ConcurrencyPool>,
	fairness: Option<FairnessTracker>,
	request_rate: Option<RequestRatePool>,
	token_rate: Option<TokenRatePool>,
	adaptive: Option<AdaptiveController>,
	last_deny: Option<LastDeny>,
	recently_released: VecDeque<LeaseId>,
}

struct Inner {
	clock: Arc<dyn Clock>,
	strict: bool,
	lease_ttl_ms: u64,
	on_event: Option<crate::config::EventSink>,
	state: Mutex<State>,
	reaper: Mutex<Option<Reaper>>,
}

/// In-process admission-control facade.
///
/// Cheap to clone: every clone shares the same underlying state and reaper thread, like an
/// `Arc`. All state-mutating operations (`acquire`, `release`, reaper sweep) are serialized
/// behind a single lock, as required by the rollback discipline in [`Self::acquire`].
#[derive(Clone)]
pub struct Governor(Arc<Inner>);
impl Governor {
	/// Builds a governor from a validated configuration, using the real system clock.
	pub fn new(config: GovernorConfig) -> Self {
		Self::with_clock(config, Arc::new(SystemClock::new()))
	}

	/// Builds a governor using the provided clock, for deterministic tests.
	pub fn with_clock(config: GovernorConfig, clock: Arc<dyn Clock>) -> Self {
		let now = clock.now_ms();
		let GovernorConfig { concurrency, rate, fairness, adaptive, lease_ttl_ms, reaper_interval_ms, strict, on_event } =
			config;

		let concurrency_pool = concurrency.map(|c| {
			ConcurrencyPool::new(c.max_in_flight, c.interactive_reserve)
				.expect("GovernorConfigBuilder::build already validated this configuration.")
		});
		let fairness_tracker =
			fairness.map(|f| FairnessTracker::new(f.soft_cap_ratio, f.starvation_window_ms));
		let request_rate_pool =
			rate.requests_per_minute.map(|cap| RequestRatePool::new(cap, rate.window_ms));
		let token_rate_pool =
			rate.tokens_per_minute.map(|cap| TokenRatePool::new(cap, rate.window_ms));
		let adaptive_controller = adaptive.map(|a| {
			AdaptiveController::new(
				a.alpha,
				a.target_deny_rate,
				a.latency_threshold,
				a.adjust_interval_ms,
				a.min_concurrency,
				now,
			)
		});

		let state = State {
			store: LeaseStore::new(),
			concurrency: concurrency_pool,
			fairness: fairness_tracker,
			request_rate: request_rate_pool,
			token_rate: token_rate_pool,
			adaptive: adaptive_controller,
			last_deny: None,
			recently_released: VecDeque::new(),
		};

		let inner = Arc::new(Inner {
			clock,
			strict,
			lease_ttl_ms,
			on_event,
			state: Mutex::new(state),
			reaper: Mutex::new(None),
		});

		let weak = Arc::downgrade(&inner);
		let reaper = Reaper::spawn(reaper_interval_ms, move || {
			if let Some(inner) = weak.upgrade() {
				Self::sweep(&inner);
			}
		});

		*inner.reaper.lock() = Some(reaper);

		Self(inner)
	}

	/// Requests a lease. See the crate's component design for the exact admission order
	/// (concurrency, fairness, request-rate, token-rate, then commit) and rollback rules.
	pub fn acquire(&self, request: AcquireRequest) -> AcquireDecision {
		let _span = OpSpan::new(GovernorOp::Acquire).entered();
		let now = self.0.clock.now_ms();
		let mut state = self.0.state.lock();

		if let (Some(concurrency), Some(adaptive)) = (&mut state.concurrency, &mut state.adaptive) {
			let new_max =
				adaptive.maybe_adjust(now, concurrency.effective_max(), concurrency.max_weight());

			concurrency.set_effective_max(new_max, adaptive.min_concurrency());
		}

		let priority = request.priority_or_default();
		let weight = request.weight();
		let estimated_tokens = request.estimated_tokens();

		if let Some(key) = request.idempotency_key.as_deref() {
			if let Some(lease) = state.store.get_by_idempotency_key(key) {
				let granted = Granted { lease_id: lease.lease_id.clone(), expires_at: lease.expires_at };

				return AcquireDecision::Granted(granted);
			}
		}

		// Step 4: concurrency.
		if let Some(concurrency) = &mut state.concurrency {
			if let Err(denial) = concurrency.try_admit(weight, priority) {
				let retry_after_ms = concurrency.retry_after_ms(now, state.store.earliest_expiry());
				let limits_hint = LimitsHint {
					in_flight: Some(denial.in_flight),
					max_in_flight: Some(denial.max_in_flight),
					..Default::default()
				};

				return self.deny(
					&mut *state,
					now,
					&request,
					weight,
					DenyReason::Concurrency,
					retry_after_ms,
					limits_hint,
					true,
				);
			}
		}

		// Step 5: fairness. A block here must undo the concurrency reservation from step 4.
		// Pressure/soft-cap thresholds are measured against the pool's fixed hard ceiling,
		// not `effective_max`, so the adaptive controller tightening concurrency doesn't
		// also silently tighten fairness.
		let max_weight = state.concurrency.as_ref().map(|pool| pool.max_weight());
		let in_flight_weight = state.concurrency.as_ref().map(|pool| pool.in_flight_weight());

		if let (Some(max_weight), Some(in_flight_weight)) = (max_weight, in_flight_weight) {
			let blocked = state
				.fairness
				.as_mut()
				.is_some_and(|fairness| {
					fairness.is_blocked(&request.actor_id, weight, in_flight_weight, max_weight, now)
				});

			if blocked {
				let earliest_expiry = state.store.earliest_expiry();

				if let Some(pool) = &mut state.concurrency {
					pool.release(weight);
				}

				let retry_after_ms =
					state.concurrency.as_ref().map_or(250, |pool| pool.retry_after_ms(now, earliest_expiry));

				return self.deny(
					&mut *state,
					now,
					&request,
					weight,
					DenyReason::Policy,
					retry_after_ms,
					LimitsHint::default(),
					true,
				);
			}
		}

		// Step 6: request-rate, probe only.
		if let Some(request_rate) = &mut state.request_rate {
			if let Err(denial) = request_rate.try_admit(now) {
				if let Some(pool) = &mut state.concurrency {
					pool.release(weight);
				}

				let limits_hint = LimitsHint {
					rate_used: Some(denial.current),
					rate_limit: Some(denial.limit),
					..Default::default()
				};

				return self.deny(
					&mut *state,
					now,
					&request,
					weight,
					DenyReason::Rate,
					denial.retry_after_ms,
					limits_hint,
					false,
				);
			}
		}

		// Step 7: token-rate, probe only.
		if let Some(token_rate) = &mut state.token_rate {
			if let Err(denial) = token_rate.try_admit(now, estimated_tokens) {
				if let Some(pool) = &mut state.concurrency {
					pool.release(weight);
				}

				let limits_hint = LimitsHint {
					rate_used: Some(denial.current),
					rate_limit: Some(denial.limit),
					..Default::default()
				};

				return self.deny(
					&mut *state,
					now,
					&request,
					weight,
					DenyReason::Rate,
					denial.retry_after_ms,
					limits_hint,
					false,
				);
			}
		}

		// Step 8: commit.
		let lease_id = LeaseId::generate();
		let lease = Lease::new(&request, lease_id.clone(), now, self.0.lease_ttl_ms);

		if let Some(request_rate) = &mut state.request_rate {
			request_rate.record(now);
		}
		if let Some(token_rate) = &mut state.token_rate {
			token_rate.record(now, estimated_tokens, Some(lease_id.clone()));
		}
		if let Some(fairness) = &mut state.fairness {
			fairness.record_acquire(&request.actor_id, weight);
		}
		if let Some(adaptive) = &mut state.adaptive {
			adaptive.record_attempt(false);
		}

		let expires_at = lease.expires_at;

		state.store.add(lease);

		obs::record_acquire();
		self.emit(GovernorEvent::Acquire {
			timestamp: now,
			lease_id: lease_id.clone(),
			actor_id: request.actor_id.clone(),
			action: request.action.clone(),
			weight,
		});

		AcquireDecision::Granted(Granted { lease_id, expires_at })
	}

	/// Releases a previously granted lease, optionally reporting how the covered call went.
	pub fn release(&self, lease_id: LeaseId, report: Option<ReleaseReport>) -> Result<(), GovernorError> {
		let _span = OpSpan::new(GovernorOp::Release).entered();
		let now = self.0.clock.now_ms();
		let mut state = self.0.state.lock();

		if self.0.strict && state.recently_released.contains(&lease_id) {
			return Err(GovernorError::DoubleRelease { lease_id: lease_id.into() });
		}

		let lease = match state.store.remove(&lease_id) {
			Some(lease) => lease,
			None =>
				return if self.0.strict {
					Err(GovernorError::UnknownLease { lease_id: lease_id.into() })
				} else {
					Ok(())
				},
		};

		Self::remember_released(&mut state.recently_released, lease_id.clone());

		if let Some(concurrency) = &mut state.concurrency {
			concurrency.release(lease.weight);
		}
		if let Some(fairness) = &mut state.fairness {
			fairness.record_release(&lease.actor_id, lease.weight);
		}

		let report = report.unwrap_or_default();

		if let Some(usage) = report.usage {
			if let Some(token_rate) = &mut state.token_rate {
				token_rate.reconcile(&lease_id, usage.total());
			}
		}
		if let Some(latency_ms) = report.latency_ms {
			if let Some(adaptive) = &mut state.adaptive {
				adaptive.record_latency(latency_ms);
			}
		}

		if self.0.strict {
			let held_ms = now.saturating_sub(lease.created_at);

			if held_ms as f64 > 0.8 * self.0.lease_ttl_ms as f64 {
				let message = format!(
					"Lease `{}` was held for {held_ms}ms, over 80% of its {}ms TTL; release sooner or raise lease_ttl_ms.",
					lease_id, self.0.lease_ttl_ms
				);

				obs::warn_message(&message);
				self.emit(GovernorEvent::Warn {
					timestamp: now,
					message,
					lease_id: Some(lease_id.clone()),
				});
			}
		}

		self.emit(GovernorEvent::Release {
			timestamp: now,
			lease_id,
			actor_id: lease.actor_id,
			action: lease.action,
			weight: lease.weight,
			outcome: report.outcome,
		});

		Ok(())
	}

	/// Returns a read-only view of the governor's current state.
	pub fn snapshot(&self) -> Snapshot {
		let now = self.0.clock.now_ms();
		let state = self.0.state.lock();

		let concurrency = state.concurrency.as_ref().map(|pool| ConcurrencySnapshot {
			in_flight_weight: pool.in_flight_weight(),
			in_flight_count: state.store.len(),
			available: pool.effective_max().saturating_sub(pool.in_flight_weight()),
			max: pool.max_weight(),
			effective_max: pool.effective_max(),
		});
		let request_rate = state
			.request_rate
			.as_ref()
			.map(|pool| RateSnapshot { current: pool.current_count(), limit: pool.cap() as u64 });
		let token_rate = state
			.token_rate
			.as_ref()
			.map(|pool| RateSnapshot { current: pool.current_sum(), limit: pool.cap() });
		let last_deny = state.last_deny.as_ref().map(|deny| LastDenySnapshot {
			reason: deny.reason,
			timestamp: deny.timestamp,
			actor_id: deny.actor_id.clone(),
		});

		Snapshot {
			timestamp: now,
			active_leases: state.store.len(),
			concurrency,
			request_rate,
			token_rate,
			fairness: state.fairness.is_some(),
			adaptive: state.adaptive.is_some(),
			last_deny,
		}
	}

	/// Stops the background reaper. Idempotent; `acquire`/`release` remain functional
	/// afterwards, only automatic expiry halts.
	pub fn dispose(&self) {
		if let Some(reaper) = self.0.reaper.lock().as_mut() {
			reaper.dispose();
		}
	}

	fn sweep(inner: &Arc<Inner>) {
		let _span = OpSpan::new(GovernorOp::Sweep).entered();
		let now = inner.clock.now_ms();
		let mut state = inner.state.lock();
		let expired = state.store.sweep(now);

		for lease in expired {
			if let Some(concurrency) = &mut state.concurrency {
				concurrency.release(lease.weight);
			}
			if let Some(fairness) = &mut state.fairness {
				fairness.record_release(&lease.actor_id, lease.weight);
			}

			let event = GovernorEvent::Expire {
				timestamp: now,
				lease_id: lease.lease_id,
				actor_id: lease.actor_id,
				action: lease.action,
				weight: lease.weight,
			};

			if let Some(sink) = &inner.on_event {
				let _ = panic::catch_unwind(AssertUnwindSafe(|| sink(&event)));
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn deny(
		&self,
		state: &mut State,
		now: u64,
		request: &AcquireRequest,
		weight: u32,
		reason: DenyReason,
		retry_after_ms: u64,
		limits_hint: LimitsHint,
		counts_against_fairness: bool,
	) -> AcquireDecision {
		if let Some(adaptive) = &mut state.adaptive {
			adaptive.record_attempt(true);
		}
		if counts_against_fairness {
			if let Some(fairness) = &mut state.fairness {
				fairness.record_denial(&request.actor_id, now);
			}
		}

		let recommendation = match reason {
			DenyReason::Concurrency =>
				"Too many concurrent requests in flight; retry after the suggested delay.".to_owned(),
			DenyReason::Rate => "Rate limit exhausted; retry after the suggested delay.".to_owned(),
			DenyReason::Policy =>
				"This actor is over its fair share under pressure; retry after the suggested delay."
					.to_owned(),
			DenyReason::Budget => "Budget exhausted; retry after the suggested delay.".to_owned(),
		};

		state.last_deny = Some(LastDeny { reason, timestamp: now, actor_id: request.actor_id.clone() });

		obs::record_deny(reason);
		obs::warn_denied(&request.actor_id, &request.action, reason.as_str(), retry_after_ms);
		self.emit(GovernorEvent::Deny {
			timestamp: now,
			actor_id: request.actor_id.clone(),
			action: request.action.clone(),
			reason,
			retry_after_ms,
			recommendation: recommendation.clone(),
			weight,
		});

		AcquireDecision::Denied(Denied { reason, retry_after_ms, recommendation, limits_hint })
	}

	fn remember_released(recently_released: &mut VecDeque<LeaseId>, lease_id: LeaseId) {
		if recently_released.len() >= RECENTLY_RELEASED_CAPACITY {
			recently_released.pop_front();
		}

		recently_released.push_back(lease_id);
	}

	fn emit(&self, event: GovernorEvent) {
		if let Some(sink) = &self.0.on_event {
			let _ = panic::catch_unwind(AssertUnwindSafe(|| sink(&event)));
		}
	}
}
impl Drop for Inner {
	fn drop(&mut self) {
		if let Some(reaper) = self.reaper.lock().as_mut() {
			reaper.dispose();
		}
	}
}

/// Read-only view of the governor's current state, returned by [`Governor::snapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
	/// Monotonic timestamp the snapshot was taken at.
	pub timestamp: u64,
	/// Number of leases currently outstanding.
	pub active_leases: usize,
	/// Concurrency state, if concurrency admission is enabled.
	pub concurrency: Option<ConcurrencySnapshot>,
	/// Request-rate state, if request-rate limiting is enabled.
	pub request_rate: Option<RateSnapshot>,
	/// Token-rate state, if token-rate limiting is enabled.
	pub token_rate: Option<RateSnapshot>,
	/// Whether per-actor fairness is enabled.
	pub fairness: bool,
	/// Whether the adaptive controller is enabled.
	pub adaptive: bool,
	/// The most recent denial observed, if any.
	pub last_deny: Option<LastDenySnapshot>,
}

/// Concurrency-pool state captured in a [`Snapshot`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConcurrencySnapshot {
	/// Current in-flight weight.
	pub in_flight_weight: u32,
	/// Current number of outstanding leases.
	pub in_flight_count: usize,
	/// Weight still available under the current effective max.
	pub available: u32,
	/// Hard ceiling.
	pub max: u32,
	/// Current effective ceiling, as adjusted by the adaptive controller.
	pub effective_max: u32,
}

/// Rolling-window rate-pool state captured in a [`Snapshot`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RateSnapshot {
	/// Current usage within the window.
	pub current: u64,
	/// Configured cap.
	pub limit: u64,
}

/// The most recent denial observed, captured in a [`Snapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastDenySnapshot {
	/// Why the request was denied.
	pub reason: DenyReason,
	/// When the denial occurred.
	pub timestamp: u64,
	/// The actor that was denied.
	pub actor_id: String,
}
