//! An in-process admission-control governor — weighted concurrency, rolling-window rate
//! limits, per-actor fairness, and adaptive self-tuning behind one `acquire`/`release`
//! facade.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod governor;
pub mod ids;
pub mod lease;
pub mod limiter;
pub mod obs;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		sync::{
			Arc,
			atomic::{AtomicU64, Ordering},
		},
		time::Instant,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;

	pub use crate::error::{GovernorError, Result};
}
