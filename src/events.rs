//! In-process publish/subscribe for session lifecycle events.
//!
//! Delivery is synchronous and follows registration order. A listener that panics is isolated:
//! the panic is caught and logged, and delivery continues with the next listener.

// std
use std::{
	panic::{self, AssertUnwindSafe},
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::_prelude::*;

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Session lifecycle notifications. Emitted, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	/// A refresh succeeded and a new pair was stored.
	Renewed {
		/// Expiry of the new access credential.
		expires_at: OffsetDateTime,
	},
	/// A refresh attempt failed transiently.
	RefreshFailedTransient {
		/// 1-based attempt number that failed.
		attempt: u32,
		/// Backoff computed for this attempt.
		delay: Duration,
	},
	/// The session expired and credentials were cleared (or none were available to renew).
	Expired,
	/// The backend reported no active session for the refresh credential.
	SessionRevoked,
	/// The upstream identity provider login expired.
	ExternalAuthExpired,
	/// Every refresh attempt failed on the network; credentials were kept.
	NetworkError {
		/// Number of backend calls made.
		attempts: u32,
	},
}
impl SessionEvent {
	/// Stable label for logs.
	pub const fn as_str(&self) -> &'static str {
		match self {
			SessionEvent::Renewed { .. } => "renewed",
			SessionEvent::RefreshFailedTransient { .. } => "refresh_failed_transient",
			SessionEvent::Expired => "expired",
			SessionEvent::SessionRevoked => "session_revoked",
			SessionEvent::ExternalAuthExpired => "external_auth_expired",
			SessionEvent::NetworkError { .. } => "network_error",
		}
	}
}
impl Display for SessionEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fan-out hub for [`SessionEvent`]s. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct SessionEventBus(Arc<BusInner>);
impl SessionEventBus {
	/// Registers a listener; it stays registered until [`Subscription::unsubscribe`] is called.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(&SessionEvent) + Send + Sync,
	{
		let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);

		self.0.listeners.write().push((id, Arc::new(listener)));

		Subscription { id, bus: Arc::downgrade(&self.0) }
	}

	/// Delivers `event` to every current listener, returning how many completed without panicking.
	pub fn emit(&self, event: &SessionEvent) -> usize {
		// Snapshot so listeners may (un)subscribe while being called.
		let listeners: Vec<Listener> =
			self.0.listeners.read().iter().map(|(_, listener)| listener.clone()).collect();
		let mut delivered = 0;

		tracing::debug!(
			event = event.as_str(),
			listeners = listeners.len(),
			"emitting session event"
		);

		for listener in listeners {
			match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
				Ok(()) => delivered += 1,
				Err(payload) => tracing::error!(
					event = event.as_str(),
					panic = panic_message(payload.as_ref()),
					"session event listener panicked"
				),
			}
		}

		delivered
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.0.listeners.read().len()
	}
}
impl Debug for SessionEventBus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionEventBus").field("listeners", &self.listener_count()).finish()
	}
}

#[derive(Default)]
struct BusInner {
	next_id: AtomicU64,
	listeners: RwLock<Vec<(u64, Listener)>>,
}

/// Handle returned by [`SessionEventBus::subscribe`].
#[must_use = "dropping the handle keeps the listener registered with no way to remove it"]
#[derive(Debug)]
pub struct Subscription {
	id: u64,
	bus: Weak<BusInner>,
}
impl Subscription {
	/// Removes the listener. Returns `false` if it was already gone or the bus was dropped.
	pub fn unsubscribe(self) -> bool {
		let Some(bus) = self.bus.upgrade() else {
			return false;
		};
		let mut listeners = bus.listeners.write();
		let before = listeners.len();

		listeners.retain(|(id, _)| *id != self.id);

		listeners.len() != before
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
	payload
		.downcast_ref::<&'static str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("<non-string panic payload>")
}
