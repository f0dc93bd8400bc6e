use std::cell::Cell;
use std::time::Duration;

use leptos::prelude::{TimeoutHandle, set_timeout_with_handle};
use log::{debug, warn};

/// Coalesces bursts of calls: only the last call made within `delay` runs.
pub struct Debouncer {
	delay: Duration,
	pending: Cell<Option<TimeoutHandle>>,
	closed: Cell<bool>,
}

impl Debouncer {
	pub fn new(delay_ms: u64) -> Self {
		Self {
			delay: Duration::from_millis(delay_ms),
			pending: Cell::new(None),
			closed: Cell::new(false),
		}
	}

	/// Schedule `f`, cancelling whatever was scheduled before. Ignored once
	/// closed.
	pub fn call(&self, f: impl FnOnce() + 'static) {
		if self.closed.get() {
			debug!("debounced call dropped after close");
			return;
		}
		self.cancel();
		match set_timeout_with_handle(f, self.delay) {
			Ok(handle) => self.pending.set(Some(handle)),
			Err(err) => warn!("could not schedule debounced call: {err:?}"),
		}
	}

	pub fn cancel(&self) {
		if let Some(handle) = self.pending.take() {
			handle.clear();
		}
	}

	/// Cancel the pending call and refuse new ones.
	pub fn close(&self) {
		self.closed.set(true);
		self.cancel();
	}

	pub fn is_closed(&self) -> bool {
		self.closed.get()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn closed_debouncer_schedules_nothing() {
		let debouncer = Debouncer::new(100);
		assert!(!debouncer.is_closed());

		debouncer.close();
		debouncer.call(|| panic!("ran after close"));
		assert!(debouncer.is_closed());
		assert!(debouncer.pending.take().is_none());
	}
}
