//! Structured decision and event values returned and emitted by the governor.

// self
use crate::{_prelude::*, ids::LeaseId, lease::Outcome};

/// Closed set of reasons an `acquire` can be denied.
///
/// `Budget` is reserved for a future cost-based limiter; the current core never emits it
/// (see the open question in the design notes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
	/// The weighted concurrency pool has no room for this request.
	Concurrency,
	/// The request-rate or token-rate rolling window is exhausted.
	Rate,
	/// Reserved for future cost-based limits; never emitted by this core.
	Budget,
	/// A policy limiter (fairness) blocked the request.
	Policy,
}
impl DenyReason {
	/// Returns a stable label, used for event payloads and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Concurrency => "concurrency",
			Self::Rate => "rate",
			Self::Budget => "budget",
			Self::Policy => "policy",
		}
	}
}
impl Display for DenyReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Limiter-populated context attached to a denial, describing why capacity ran out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsHint {
	/// Current in-flight weight, when the concurrency pool was the one denying.
	pub in_flight: Option<u32>,
	/// Configured effective max, when the concurrency pool was the one denying.
	pub max_in_flight: Option<u32>,
	/// Current rolling-window usage, when a rate pool was the one denying.
	pub rate_used: Option<u64>,
	/// Configured rolling-window cap, when a rate pool was the one denying.
	pub rate_limit: Option<u64>,
}

/// A denied acquire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Denied {
	/// Why the request was denied.
	pub reason: DenyReason,
	/// How long the caller should wait before retrying, clamped to `[25, 5000]` ms.
	pub retry_after_ms: u64,
	/// Human-readable guidance suitable for logs or error messages.
	pub recommendation: String,
	/// Structured context from the limiter that denied the request.
	pub limits_hint: LimitsHint,
}

/// A granted acquire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Granted {
	/// The issued lease id.
	pub lease_id: LeaseId,
	/// Monotonic expiry timestamp, in ms.
	pub expires_at: u64,
}

/// Outcome of a call to [`crate::governor::Governor::acquire`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquireDecision {
	/// The lease was granted.
	Granted(Granted),
	/// The lease was denied.
	Denied(Denied),
}
impl AcquireDecision {
	/// Returns the granted lease id, if this decision is a grant.
	pub fn lease_id(&self) -> Option<&LeaseId> {
		match self {
			Self::Granted(granted) => Some(&granted.lease_id),
			Self::Denied(_) => None,
		}
	}

	/// Returns `true` if this decision is a grant.
	pub fn is_granted(&self) -> bool {
		matches!(self, Self::Granted(_))
	}
}

/// Structured event emitted for every state transition the governor makes.
///
/// Handlers receive these inline, under the governor's lock; a handler that panics has
/// that panic caught and discarded so observability never corrupts core state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GovernorEvent {
	/// A lease was granted.
	Acquire {
		/// Monotonic timestamp of the event.
		timestamp: u64,
		/// Granted lease id.
		lease_id: LeaseId,
		/// Fairness principal charged.
		actor_id: String,
		/// Informational action label.
		action: String,
		/// Concurrency units consumed.
		weight: u32,
	},
	/// An `acquire` was denied.
	Deny {
		/// Monotonic timestamp of the event.
		timestamp: u64,
		/// Fairness principal that was denied.
		actor_id: String,
		/// Informational action label.
		action: String,
		/// Why the request was denied.
		reason: DenyReason,
		/// Suggested retry delay, in ms.
		retry_after_ms: u64,
		/// Human-readable guidance.
		recommendation: String,
		/// Concurrency units the request would have consumed.
		weight: u32,
	},
	/// A lease was released by its caller.
	Release {
		/// Monotonic timestamp of the event.
		timestamp: u64,
		/// Lease id that was released.
		lease_id: LeaseId,
		/// Fairness principal charged.
		actor_id: String,
		/// Informational action label.
		action: String,
		/// Concurrency units freed.
		weight: u32,
		/// Reported outcome of the covered call, if supplied.
		outcome: Option<Outcome>,
	},
	/// A lease expired and was reclaimed by the reaper.
	Expire {
		/// Monotonic timestamp of the event.
		timestamp: u64,
		/// Lease id that expired.
		lease_id: LeaseId,
		/// Fairness principal charged.
		actor_id: String,
		/// Informational action label.
		action: String,
		/// Concurrency units freed.
		weight: u32,
	},
	/// A free-form advisory, e.g. a lease held past most of its TTL in strict mode.
	Warn {
		/// Monotonic timestamp of the event.
		timestamp: u64,
		/// Human-readable message.
		message: String,
		/// Lease the warning pertains to, if any.
		lease_id: Option<LeaseId>,
	},
}
impl GovernorEvent {
	/// Returns a stable label for the event's variant, used for logging/metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Acquire { .. } => "acquire",
			Self::Deny { .. } => "deny",
			Self::Release { .. } => "release",
			Self::Expire { .. } => "expire",
			Self::Warn { .. } => "warn",
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn deny_reason_labels_are_stable() {
		assert_eq!(DenyReason::Concurrency.as_str(), "concurrency");
		assert_eq!(DenyReason::Rate.as_str(), "rate");
		assert_eq!(DenyReason::Budget.as_str(), "budget");
		assert_eq!(DenyReason::Policy.as_str(), "policy");
	}

	#[test]
	fn acquire_decision_exposes_lease_id_only_when_granted() {
		let granted =
			AcquireDecision::Granted(Granted { lease_id: LeaseId::generate(), expires_at: 1_000 });
		let denied = AcquireDecision::Denied(Denied {
			reason: DenyReason::Concurrency,
			retry_after_ms: 250,
			recommendation: "retry later".into(),
			limits_hint: LimitsHint::default(),
		});

		assert!(granted.is_granted());
		assert!(granted.lease_id().is_some());
		assert!(!denied.is_granted());
		assert!(denied.lease_id().is_none());
	}

	#[test]
	fn events_serialize_with_a_tagged_type_field() {
		let event = GovernorEvent::Warn {
			timestamp: 42,
			message: "held too long".into(),
			lease_id: Some(LeaseId::generate()),
		};
		let json = serde_json::to_value(&event).expect("GovernorEvent should serialize to JSON.");

		assert_eq!(json["type"], "warn");
		assert_eq!(event.kind(), "warn");
	}
}
