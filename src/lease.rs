//! The lease record and the small value types that describe a request for one.

// self
use crate::{_prelude::*, ids::LeaseId};

/// Scheduling priority attached to an acquire request.
///
/// Background-priority requests are the ones an [`crate::limiter::concurrency::ConcurrencyPool`]
/// configured with an `interactive_reserve` will refuse once only the reserve remains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	/// User-facing call; may consume the interactive reserve.
	Interactive,
	/// Best-effort background call; never allowed to eat into the reserve.
	Background,
}
impl Default for Priority {
	fn default() -> Self {
		Self::Interactive
	}
}

/// Cost estimate supplied by the caller at acquire time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
	/// Concurrency units this lease will consume. Defaults to `1` when unset.
	pub weight: Option<u32>,
	/// Estimated prompt/input tokens.
	pub prompt_tokens: u64,
	/// Estimated maximum output tokens.
	pub max_output_tokens: u64,
}
impl Estimate {
	/// Returns the configured weight, defaulting to `1`.
	pub fn weight_or_default(&self) -> u32 {
		self.weight.unwrap_or(1)
	}

	/// Returns `prompt_tokens + max_output_tokens`, the amount charged at acquisition.
	pub fn estimated_tokens(&self) -> u64 {
		self.prompt_tokens.saturating_add(self.max_output_tokens)
	}
}

/// Final disposition of the work a lease covered, reported back at `release` time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	/// The call completed and returned a usable result.
	Success,
	/// The call failed with an error.
	Error,
	/// The call exceeded its own deadline.
	Timeout,
	/// The caller cancelled the call before it completed.
	Cancelled,
}

/// Actual token usage for a completed call, used to reconcile the token-rate pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
	/// Actual prompt/input tokens consumed.
	pub prompt_tokens: u64,
	/// Actual output tokens produced.
	pub output_tokens: u64,
}
impl TokenUsage {
	/// Total tokens actually consumed.
	pub fn total(&self) -> u64 {
		self.prompt_tokens.saturating_add(self.output_tokens)
	}
}

/// Optional report supplied to [`crate::governor::Governor::release`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReport {
	/// How the covered call actually turned out.
	pub outcome: Option<Outcome>,
	/// Actual token usage, if known, used to reconcile the token-rate pool.
	pub usage: Option<TokenUsage>,
	/// Observed latency in milliseconds, fed to the adaptive controller.
	pub latency_ms: Option<u64>,
}

/// A request to acquire a lease.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireRequest {
	/// Caller-supplied fairness principal.
	pub actor_id: String,
	/// Caller-supplied informational label.
	pub action: String,
	/// Scheduling priority; defaults to [`Priority::Interactive`].
	pub priority: Option<Priority>,
	/// Cost estimate; defaults to weight `1` and zero tokens.
	pub estimate: Option<Estimate>,
	/// Optional idempotency key; a live lease under the same key is re-handed out.
	pub idempotency_key: Option<String>,
}
impl AcquireRequest {
	/// Creates a minimal request with just the required fields.
	pub fn new(actor_id: impl Into<String>, action: impl Into<String>) -> Self {
		Self { actor_id: actor_id.into(), action: action.into(), ..Default::default() }
	}

	/// Sets the priority.
	pub fn with_priority(mut self, priority: Priority) -> Self {
		self.priority = Some(priority);

		self
	}

	/// Sets the cost estimate.
	pub fn with_estimate(mut self, estimate: Estimate) -> Self {
		self.estimate = Some(estimate);

		self
	}

	/// Sets the idempotency key.
	pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
		self.idempotency_key = Some(key.into());

		self
	}

	pub(crate) fn priority_or_default(&self) -> Priority {
		self.priority.unwrap_or_default()
	}

	pub(crate) fn weight(&self) -> u32 {
		self.estimate.as_ref().map(Estimate::weight_or_default).unwrap_or(1)
	}

	pub(crate) fn estimated_tokens(&self) -> u64 {
		self.estimate.as_ref().map(Estimate::estimated_tokens).unwrap_or(0)
	}
}

/// An issued, in-flight permission to perform one unit of outbound work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
	/// Opaque, globally-unique id for this lease.
	pub lease_id: LeaseId,
	/// Fairness principal this lease is charged against.
	pub actor_id: String,
	/// Informational label supplied by the caller.
	pub action: String,
	/// Scheduling priority this lease was admitted under.
	pub priority: Priority,
	/// Concurrency units this lease consumes.
	pub weight: u32,
	/// Idempotency key this lease was created under, if any.
	pub idempotency_key: Option<String>,
	/// Monotonic creation timestamp, in ms.
	pub created_at: u64,
	/// Monotonic expiry timestamp, in ms; the reaper removes the lease once this passes.
	pub expires_at: u64,
	/// Tokens charged against the token-rate pool at acquisition.
	pub estimated_tokens: u64,
}
impl Lease {
	pub(crate) fn new(request: &AcquireRequest, lease_id: LeaseId, now: u64, ttl_ms: u64) -> Self {
		Self {
			lease_id,
			actor_id: request.actor_id.clone(),
			action: request.action.clone(),
			priority: request.priority_or_default(),
			weight: request.weight(),
			idempotency_key: request.idempotency_key.clone(),
			created_at: now,
			expires_at: now.saturating_add(ttl_ms),
			estimated_tokens: request.estimated_tokens(),
		}
	}
}
