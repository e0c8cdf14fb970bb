//! Opaque lease identifiers.

// std
use std::fmt::{self, Debug, Display, Formatter};
// crates.io
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

const LEASE_ID_LEN: usize = 22;

/// Opaque, globally-unique (within the process) handle to an issued [`crate::lease::Lease`].
///
/// External callers only ever see this id; the governor is the sole owner of the
/// record it names. Generation is cryptographically random so ids cannot be guessed
/// or reused across leases.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(String);
impl LeaseId {
	/// Generates a new random lease id.
	pub fn generate() -> Self {
		let value = rand::rng()
			.sample_iter(&Alphanumeric)
			.take(LEASE_ID_LEN)
			.map(char::from)
			.collect();

		Self(value)
	}

	/// Returns the id as a plain string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for LeaseId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<LeaseId> for String {
	fn from(value: LeaseId) -> Self {
		value.0
	}
}
impl From<String> for LeaseId {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for LeaseId {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "LeaseId({})", self.0)
	}
}
impl Display for LeaseId {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn generated_ids_are_unique_and_sized() {
		let a = LeaseId::generate();
		let b = LeaseId::generate();

		assert_ne!(a, b);
		assert_eq!(a.as_str().len(), LEASE_ID_LEN);
	}

	#[test]
	fn serde_round_trip_is_transparent() {
		let id = LeaseId::generate();
		let json = serde_json::to_string(&id).expect("LeaseId should serialize to a JSON string.");
		let round_trip: LeaseId =
			serde_json::from_str(&json).expect("LeaseId should deserialize from a JSON string.");

		assert_eq!(id, round_trip);
	}
}
