//! Single-flight refresh guard.
//!
//! The guard is a two-state machine:
//!
//! - `Idle → Refreshing` only through [`RefreshState::try_begin`], a single compare-exchange; the
//!   winner receives a [`RefreshFlight`].
//! - `Refreshing → Idle` only when that [`RefreshFlight`] drops, which covers success, failure,
//!   panics, and cancelled futures alike. Every release bumps a landing counter so tasks parked
//!   in [`RefreshState::wait_idle`] wake up.

// std
use std::sync::atomic::{AtomicU8, Ordering};
// crates.io
use tokio::sync::watch;
// self
use crate::_prelude::*;

const IDLE: u8 = 0;
const REFRESHING: u8 = 1;

/// Observable phase of a [`RefreshState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh is running.
	Idle,
	/// A refresh holds the guard.
	Refreshing,
}

/// Atomic single-flight guard for one credential class.
pub struct RefreshState {
	phase: AtomicU8,
	landed: watch::Sender<u64>,
}
impl RefreshState {
	/// Creates an idle guard.
	pub fn new() -> Self {
		let (landed, _) = watch::channel(0);

		Self { phase: AtomicU8::new(IDLE), landed }
	}

	/// Returns the current phase.
	pub fn phase(&self) -> RefreshPhase {
		match self.phase.load(Ordering::Acquire) {
			IDLE => RefreshPhase::Idle,
			_ => RefreshPhase::Refreshing,
		}
	}

	/// Returns `true` while a refresh holds the guard.
	pub fn is_refreshing(&self) -> bool {
		matches!(self.phase(), RefreshPhase::Refreshing)
	}

	/// Attempts the `Idle → Refreshing` transition.
	///
	/// Returns `None` when another refresh already holds the guard.
	pub fn try_begin(&self) -> Option<RefreshFlight<'_>> {
		self.phase
			.compare_exchange(IDLE, REFRESHING, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| RefreshFlight { state: self })
	}

	/// Number of completed flights (successful or not).
	pub fn landings(&self) -> u64 {
		*self.landed.borrow()
	}

	/// Waits until the refresh in flight (if any) releases the guard.
	pub async fn wait_idle(&self) {
		let mut landed = self.landed.subscribe();

		// Subscribing before the phase check guarantees the release notification is observed.
		if !self.is_refreshing() {
			return;
		}

		let _ = landed.changed().await;
	}

	fn release(&self) {
		self.phase.store(IDLE, Ordering::Release);
		self.landed.send_modify(|count| *count = count.wrapping_add(1));
	}
}
impl Default for RefreshState {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for RefreshState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshState")
			.field("phase", &self.phase())
			.field("landings", &self.landings())
			.finish()
	}
}

/// Proof of holding the refresh guard; dropping it returns the guard to `Idle`.
#[must_use = "dropping the flight immediately releases the refresh guard"]
pub struct RefreshFlight<'a> {
	state: &'a RefreshState,
}
impl Drop for RefreshFlight<'_> {
	fn drop(&mut self) {
		self.state.release();
	}
}
impl Debug for RefreshFlight<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RefreshFlight(..)")
	}
}
