//! Mutable coordinator state guarded by a single mutex.

// crates.io
use tokio::task::JoinHandle;
// self
use crate::{_prelude::*, auth::TokenSecret, error::RefreshFailure};

/// Result shared by every caller that joined one refresh flight.
pub(crate) type FlightOutcome = std::result::Result<TokenSecret, RefreshFailure>;
/// One refresh flight; settled exactly once.
pub(crate) type Flight = Arc<AsyncOnceCell<FlightOutcome>>;

#[derive(Default)]
pub(crate) struct CoordinatorState {
	in_flight: Option<Flight>,
	retry_count: u32,
	timer: Option<RenewalTimer>,
	timer_generation: u64,
}
impl CoordinatorState {
	/// Returns the unsettled flight, or starts a new one. The flag is `true` for the caller that
	/// started it.
	pub(crate) fn join_or_start(&mut self) -> (Flight, bool) {
		if let Some(flight) = self.in_flight.as_ref().filter(|flight| !flight.is_initialized()) {
			return (flight.clone(), false);
		}

		let flight = Arc::new(AsyncOnceCell::new());

		self.in_flight = Some(flight.clone());

		(flight, true)
	}

	/// Drops the flight slot if it still points at `flight`.
	pub(crate) fn settle(&mut self, flight: &Flight) {
		if self.in_flight.as_ref().is_some_and(|current| Arc::ptr_eq(current, flight)) {
			self.in_flight = None;
		}
	}

	pub(crate) fn is_refreshing(&self) -> bool {
		self.in_flight.as_ref().is_some_and(|flight| !flight.is_initialized())
	}

	pub(crate) fn retry_count(&self) -> u32 {
		self.retry_count
	}

	pub(crate) fn set_retry_count(&mut self, count: u32) {
		self.retry_count = count;
	}

	/// Reserves a generation for a timer about to be spawned.
	pub(crate) fn next_timer_generation(&mut self) -> u64 {
		self.timer_generation = self.timer_generation.wrapping_add(1);

		self.timer_generation
	}

	/// Installs `timer`, aborting whatever was armed before.
	pub(crate) fn replace_timer(&mut self, timer: RenewalTimer) {
		if let Some(previous) = self.timer.replace(timer) {
			previous.handle.abort();
		}
	}

	/// Aborts the armed timer. Returns `true` if one was armed.
	pub(crate) fn cancel_timer(&mut self) -> bool {
		match self.timer.take() {
			Some(timer) => {
				timer.handle.abort();

				true
			},
			None => false,
		}
	}

	/// Called by a firing timer. Returns `false` when the timer was superseded while sleeping.
	pub(crate) fn release_timer(&mut self, generation: u64) -> bool {
		if self.timer.as_ref().is_some_and(|timer| timer.generation == generation) {
			self.timer = None;

			return true;
		}

		false
	}

	pub(crate) fn scheduled_renewal(&self) -> Option<OffsetDateTime> {
		self.timer.as_ref().map(|timer| timer.fires_at)
	}
}

pub(crate) struct RenewalTimer {
	pub(crate) generation: u64,
	pub(crate) fires_at: OffsetDateTime,
	pub(crate) handle: JoinHandle<()>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callers_join_an_unsettled_flight() {
		let mut state = CoordinatorState::default();
		let (first, started) = state.join_or_start();

		assert!(started);
		assert!(state.is_refreshing());

		let (second, started) = state.join_or_start();

		assert!(!started);
		assert!(Arc::ptr_eq(&first, &second));
	}

	#[test]
	fn settled_flights_are_never_rejoined() {
		let mut state = CoordinatorState::default();
		let (first, _) = state.join_or_start();

		assert!(first.set_blocking(Ok(TokenSecret::new("a"))).is_ok());
		assert!(!state.is_refreshing());

		let (second, started) = state.join_or_start();

		assert!(started);
		assert!(!Arc::ptr_eq(&first, &second));

		// A late settle from the first flight must not clear the second.
		state.settle(&first);

		assert!(state.is_refreshing());

		state.settle(&second);

		assert!(!state.is_refreshing());
	}
}
