//! Background renewal timer.

// crates.io
use tokio::runtime::Handle;
// self
use super::{TokenCoordinator, state::RenewalTimer, to_std};
use crate::{_prelude::*, auth::CredentialPair};

impl TokenCoordinator {
	/// Arms (or re-arms) the renewal timer for `pair`, replacing any previous timer.
	///
	/// Without a Tokio runtime the timer is skipped and renewal falls back to the buffer check in
	/// [`get_valid_credential`](Self::get_valid_credential).
	pub(crate) fn arm_renewal(&self, pair: &CredentialPair) {
		let fires_at = pair.renewal_due_at(self.inner.config.refresh_buffer);
		let wait = to_std(fires_at - self.now());
		let Ok(runtime) = Handle::try_current() else {
			tracing::warn!("no Tokio runtime available; background renewal disabled");

			return;
		};
		let weak = Arc::downgrade(&self.inner);
		let mut state = self.inner.state.lock();
		let generation = state.next_timer_generation();
		let handle = runtime.spawn(async move {
			tokio::time::sleep(wait).await;

			let Some(inner) = weak.upgrade() else {
				return;
			};

			if !inner.state.lock().release_timer(generation) {
				return;
			}

			let coordinator = TokenCoordinator { inner };

			tracing::debug!("background renewal firing");

			if let Err(e) = coordinator.refresh().await {
				tracing::debug!(error = %e, "background renewal failed");
			}
		});

		tracing::debug!(%fires_at, "background renewal armed");

		state.replace_timer(RenewalTimer { generation, fires_at, handle });
	}

	/// Returns `true` when an armed timer was cancelled.
	pub(crate) fn cancel_renewal(&self) -> bool {
		self.inner.state.lock().cancel_timer()
	}
}
