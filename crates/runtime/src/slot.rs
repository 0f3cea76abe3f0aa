//! Capacity-one handshake cell.
//!
//! One side [`offer`](CommandSlot::offer)s a value, the other
//! [`poll`](CommandSlot::poll_with_timeout)s for it with a bounded wait.
//! The state lives under a [`parking_lot::Mutex`] that is never held across
//! an await, so the same task can offer and then poll without deadlocking
//! against itself. Waiters register on a [`Notify`] before checking the
//! state to prevent lost wakeups.
//!
//! Closing a slot injects its poison value: the slot is emptied and every
//! later poll returns the poison immediately, while every offer fails.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

struct SlotState<T> {
	value: Option<T>,
	poisoned: bool,
}

/// Single-entry slot with bounded wait and a poison value for teardown.
pub struct CommandSlot<T> {
	name: &'static str,
	state: Mutex<SlotState<T>>,
	changed: Notify,
	poison: T,
}

impl<T> CommandSlot<T>
where
	T: Clone + PartialEq + fmt::Debug,
{
	pub fn new(name: &'static str, poison: T) -> Self {
		Self {
			name,
			state: Mutex::new(SlotState {
				value: None,
				poisoned: false,
			}),
			changed: Notify::new(),
			poison,
		}
	}

	/// Stores `value` if the slot is empty. Never blocks, never overwrites.
	pub fn offer(&self, value: T) -> bool {
		let mut state = self.state.lock();
		if state.poisoned {
			debug!(target = "webrc.slot", slot = self.name, ?value, "offer refused, slot poisoned");
			return false;
		}
		if state.value.is_some() {
			debug!(target = "webrc.slot", slot = self.name, ?value, "offer refused, slot full");
			return false;
		}
		trace!(target = "webrc.slot", slot = self.name, ?value, "value offered");
		state.value = Some(value);
		drop(state);

		self.changed.notify_waiters();
		true
	}

	/// Takes the pending value, waiting up to `timeout` for one to arrive.
	///
	/// Returns immediately when a value is already present. A zero timeout
	/// only checks. Returns `None` once the deadline passes.
	pub async fn poll_with_timeout(&self, timeout: Duration) -> Option<T> {
		if let Some(value) = self.try_take() {
			trace!(target = "webrc.slot", slot = self.name, "value was waiting");
			return Some(value);
		}
		if timeout.is_zero() {
			return None;
		}

		let deadline = Instant::now() + timeout;
		loop {
			let notified = self.changed.notified();

			if let Some(value) = self.try_take() {
				return Some(value);
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				debug!(target = "webrc.slot", slot = self.name, ?timeout, "poll timed out");
				return None;
			}

			tokio::select! {
				biased;
				_ = notified => {}
				_ = tokio::time::sleep(remaining) => {}
			}
		}
	}

	/// Pending value (or the poison), without consuming it.
	pub fn peek(&self) -> Option<T> {
		let state = self.state.lock();
		if state.poisoned {
			return Some(self.poison.clone());
		}
		state.value.clone()
	}

	pub fn is_empty(&self) -> bool {
		let state = self.state.lock();
		!state.poisoned && state.value.is_none()
	}

	/// Empties the slot and makes every later poll return the poison.
	///
	/// Wakes all current waiters.
	pub fn clear_and_inject_poison(&self) {
		let mut state = self.state.lock();
		if let Some(discarded) = state.value.take() {
			debug!(target = "webrc.slot", slot = self.name, ?discarded, "discarding pending value");
		}
		state.poisoned = true;
		drop(state);

		debug!(target = "webrc.slot", slot = self.name, "poison injected");
		self.changed.notify_waiters();
	}

	pub fn is_poison(&self, value: &T) -> bool {
		*value == self.poison
	}

	pub fn is_poisoned(&self) -> bool {
		self.state.lock().poisoned
	}

	/// Takes the pending value (or the poison) without waiting.
	pub fn try_take(&self) -> Option<T> {
		let mut state = self.state.lock();
		if state.poisoned {
			return Some(self.poison.clone());
		}
		state.value.take()
	}
}

impl<T: fmt::Debug> fmt::Debug for CommandSlot<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("CommandSlot")
			.field("name", &self.name)
			.field("value", &state.value)
			.field("poisoned", &state.poisoned)
			.finish()
	}
}
