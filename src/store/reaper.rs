//! Detached background thread that periodically sweeps expired leases.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};
// crates.io
use parking_lot::{Condvar, Mutex};

/// Runs `sweep` on a fixed interval from a detached OS thread until disposed.
///
/// The thread parks on a [`Condvar`] between sweeps rather than plain `sleep`, so
/// [`Reaper::dispose`] can wake it immediately instead of waiting out the interval.
pub struct Reaper {
	shutdown: Arc<(Mutex<bool>, Condvar)>,
	handle: Option<JoinHandle<()>>,
	disposed: AtomicBool,
}
impl Reaper {
	/// Spawns the reaper thread, invoking `sweep` every `interval_ms` until disposed.
	///
	/// `sweep` is expected to acquire whatever lock guards the governor's state itself;
	/// the reaper holds no lock across calls.
	pub fn spawn(interval_ms: u64, mut sweep: impl FnMut() + Send + 'static) -> Self {
		let shutdown = Arc::new((Mutex::new(false), Condvar::new()));
		let thread_shutdown = shutdown.clone();
		let interval = Duration::from_millis(interval_ms.max(1));

		let handle = thread::Builder::new()
			.name("lease-governor-reaper".into())
			.spawn(move || {
				let (lock, cvar) = &*thread_shutdown;
				let mut guard = lock.lock();

				loop {
					let result = cvar.wait_for(&mut guard, interval);

					if *guard {
						return;
					}

					if !result.timed_out() {
						continue;
					}

					sweep();
				}
			})
			.expect("Failed to spawn the lease reaper thread.");

		Self { shutdown, handle: Some(handle), disposed: AtomicBool::new(false) }
	}

	/// Stops the reaper thread. Idempotent; safe to call more than once or never.
	pub fn dispose(&mut self) {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return;
		}

		{
			let (lock, cvar) = &*self.shutdown;
			*lock.lock() = true;
			cvar.notify_all();
		}

		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}
impl Drop for Reaper {
	fn drop(&mut self) {
		self.dispose();
	}
}
