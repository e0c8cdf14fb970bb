//! Lease storage: the authoritative set of outstanding leases, indexed for fast lookup and
//! reaping.

pub mod reaper;

pub use reaper::Reaper;

// self
use crate::{_prelude::*, ids::LeaseId, lease::Lease};

/// In-process store for active leases, indexed by id and by idempotency key.
///
/// Not `Send` on its own; the governor wraps it behind the single lock that serializes
/// every state-mutating operation.
#[derive(Debug, Default)]
pub struct LeaseStore {
	leases: HashMap<LeaseId, Lease>,
	by_idempotency_key: HashMap<String, LeaseId>,
}
impl LeaseStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `lease`, indexing it by idempotency key as well if one is present.
	pub fn add(&mut self, lease: Lease) {
		if let Some(key) = lease.idempotency_key.clone() {
			self.by_idempotency_key.insert(key, lease.lease_id.clone());
		}

		self.leases.insert(lease.lease_id.clone(), lease);
	}

	/// Looks up a lease by id.
	pub fn get(&self, lease_id: &LeaseId) -> Option<&Lease> {
		self.leases.get(lease_id)
	}

	/// Looks up a lease by idempotency key, cleaning up the key index if the lease it
	/// pointed to is already gone.
	pub fn get_by_idempotency_key(&mut self, key: &str) -> Option<&Lease> {
		let lease_id = self.by_idempotency_key.get(key)?.clone();

		if self.leases.contains_key(&lease_id) {
			self.leases.get(&lease_id)
		} else {
			self.by_idempotency_key.remove(key);

			None
		}
	}

	/// Removes a lease from both indices, returning it if it was present.
	pub fn remove(&mut self, lease_id: &LeaseId) -> Option<Lease> {
		let lease = self.leases.remove(lease_id)?;

		if let Some(key) = lease.idempotency_key.as_deref() {
			self.by_idempotency_key.remove(key);
		}

		Some(lease)
	}

	/// Minimum `expires_at` across every stored lease, or `None` if the store is empty.
	pub fn earliest_expiry(&self) -> Option<u64> {
		self.leases.values().map(|lease| lease.expires_at).min()
	}

	/// Removes and returns every lease whose `expires_at` is at or before `now`.
	///
	/// Idempotent: calling this with nothing expired returns an empty `Vec`.
	pub fn sweep(&mut self, now: u64) -> Vec<Lease> {
		let expired_ids: Vec<LeaseId> = self
			.leases
			.values()
			.filter(|lease| lease.expires_at <= now)
			.map(|lease| lease.lease_id.clone())
			.collect();

		expired_ids.into_iter().filter_map(|lease_id| self.remove(&lease_id)).collect()
	}

	/// Number of leases currently held.
	pub fn len(&self) -> usize {
		self.leases.len()
	}

	/// Whether the store currently holds no leases.
	pub fn is_empty(&self) -> bool {
		self.leases.is_empty()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::lease::AcquireRequest;

	fn lease_fixture(id: &str, idempotency_key: Option<&str>, expires_at: u64) -> Lease {
		let mut request = AcquireRequest::new("actor-1", "chat.completion");

		if let Some(key) = idempotency_key {
			request = request.with_idempotency_key(key);
		}

		Lease::new(&request, LeaseId::from(id.to_owned()), 0, expires_at)
	}

	#[test]
	fn add_then_get_round_trips() {
		let mut store = LeaseStore::new();
		let lease = lease_fixture("lease-a", None, 1_000);

		store.add(lease.clone());

		assert_eq!(store.get(&lease.lease_id).map(|l| &l.lease_id), Some(&lease.lease_id));
	}

	#[test]
	fn idempotency_lookup_finds_the_live_lease() {
		let mut store = LeaseStore::new();
		let lease = lease_fixture("lease-a", Some("idem-1"), 1_000);

		store.add(lease.clone());

		assert_eq!(
			store.get_by_idempotency_key("idem-1").map(|l| &l.lease_id),
			Some(&lease.lease_id)
		);
	}

	#[test]
	fn idempotency_lookup_cleans_up_after_removal() {
		let mut store = LeaseStore::new();
		let lease = lease_fixture("lease-a", Some("idem-1"), 1_000);

		store.add(lease.clone());
		store.remove(&lease.lease_id);

		assert!(store.get_by_idempotency_key("idem-1").is_none());
	}

	#[test]
	fn earliest_expiry_reports_the_minimum() {
		let mut store = LeaseStore::new();

		store.add(lease_fixture("lease-a", None, 5_000));
		store.add(lease_fixture("lease-b", None, 1_000));

		assert_eq!(store.earliest_expiry(), Some(1_000));
	}

	#[test]
	fn earliest_expiry_is_none_when_empty() {
		assert_eq!(LeaseStore::new().earliest_expiry(), None);
	}

	#[test]
	fn sweep_removes_only_expired_leases_and_is_idempotent() {
		let mut store = LeaseStore::new();

		store.add(lease_fixture("lease-a", None, 500));
		store.add(lease_fixture("lease-b", None, 5_000));

		let expired = store.sweep(1_000);

		assert_eq!(expired.len(), 1);
		assert_eq!(expired[0].lease_id, LeaseId::from("lease-a".to_owned()));
		assert_eq!(store.len(), 1);
		assert!(store.sweep(1_000).is_empty(), "A second sweep with nothing expired is a no-op.");
	}
}
