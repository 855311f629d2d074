//! Session lifecycle coordination.
//!
//! [`TokenCoordinator`] owns every transition of the stored credential pair: login persistence,
//! proactive renewal, single-flight refresh with bounded backoff, permanent-failure teardown, and
//! logout. Clones share one coordinator; at most one refresh call is in flight across all of them.

pub mod clock;
pub mod config;

mod metrics;
mod refresh;
mod schedule;
mod state;

pub use self::{clock::*, config::*, metrics::RefreshMetrics};

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, DeviceIdentity, TokenGrant, TokenSecret},
	backend::{AuthBackend, DefaultFailureStrategy, FailureStrategy, LoginRequest, LogoutRequest},
	error::{ConfigError, RefreshFailure},
	events::{SessionEvent, SessionEventBus},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CredentialStore, CredentialVault},
};
use state::CoordinatorState;

/// Shared handle to the session core. Cheap to clone.
#[derive(Clone)]
pub struct TokenCoordinator {
	inner: Arc<CoordinatorInner>,
}
impl TokenCoordinator {
	/// Starts a builder over the given store and backend.
	pub fn builder(
		store: Arc<dyn CredentialStore>,
		backend: Arc<dyn AuthBackend>,
	) -> TokenCoordinatorBuilder {
		TokenCoordinatorBuilder {
			store,
			backend,
			config: SessionConfig::default(),
			strategy: None,
			events: None,
			clock: None,
		}
	}

	/// Arms background renewal for a previously persisted session.
	///
	/// A pair that is already inside the renewal buffer is refreshed right away on the runtime.
	pub async fn init(&self) -> Result<()> {
		match self.inner.vault.load_credentials().await? {
			Some(pair) if pair.is_authenticated() => {
				tracing::debug!(expires_at = %pair.expires_at, "restored persisted session");

				self.arm_renewal(&pair);
			},
			_ => tracing::debug!("no persisted session to restore"),
		}

		Ok(())
	}

	/// Cancels background renewal. In-flight refreshes still settle.
	pub fn dispose(&self) {
		if self.cancel_renewal() {
			tracing::debug!("background renewal cancelled");
		}
	}

	/// Returns a usable access credential, renewing it first when it is inside the buffer.
	///
	/// `Ok(None)` means the caller is not authenticated: nothing is stored, the session ended, or
	/// the credential lapsed while the backend was unreachable. A stale credential that has not
	/// yet expired is still returned when renewal fails transiently.
	pub async fn get_valid_credential(&self) -> Result<Option<TokenSecret>> {
		let Some(pair) = self.inner.vault.load_credentials().await? else {
			return Ok(None);
		};

		if pair.access_token.is_empty() {
			return Ok(None);
		}
		if !pair.needs_renewal_at(self.now(), self.inner.config.refresh_buffer) {
			return Ok(Some(pair.access_token));
		}
		if !pair.is_authenticated() {
			tracing::info!("access token is expiring and no refresh token is stored");

			self.inner.events.emit(&SessionEvent::Expired);

			return Ok(None);
		}

		match self.refresh().await {
			Ok(token) => Ok(Some(token)),
			Err(Error::Refresh(RefreshFailure::Storage(e))) => Err(e.into()),
			Err(Error::Refresh(
				RefreshFailure::Exhausted { .. } | RefreshFailure::MalformedGrant { .. },
			)) if !pair.is_expired_at(self.now()) => {
				tracing::debug!("renewal failed; serving the unexpired credential");

				Ok(Some(pair.access_token))
			},
			Err(Error::Refresh(failure)) => {
				tracing::debug!(error = %failure, "no valid credential after renewal attempt");

				Ok(None)
			},
			Err(e) => Err(e),
		}
	}

	/// Wipes the stored credential pair and cancels background renewal. Idempotent; emits nothing.
	pub async fn clear(&self) -> Result<()> {
		self.cancel_renewal();

		if self.inner.vault.clear_credentials().await? {
			tracing::debug!("stored credentials cleared");
		}

		Ok(())
	}

	/// Authenticates against the backend and persists the resulting pair.
	///
	/// The request body receives the device identifier unless it already carries one.
	pub async fn login(&self, request: LoginRequest) -> Result<CredentialPair> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let device = self.inner.vault.device_identity().await?;
				let grant =
					self.inner.backend.login(request.with_device_id(&device.device_id)).await?;

				self.save_grant(grant).await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Persists a grant obtained elsewhere and arms background renewal.
	pub async fn save_grant(&self, grant: TokenGrant) -> Result<CredentialPair> {
		let pair = CredentialPair::from_grant(grant, self.now())?;

		self.inner.vault.save_credentials(&pair).await?;
		self.arm_renewal(&pair);

		tracing::debug!(expires_at = %pair.expires_at, "credential pair stored");

		Ok(pair)
	}

	/// Best-effort server-side logout followed by a local [`clear`](Self::clear).
	///
	/// Backend failures are logged and swallowed; only local storage failures are returned.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let stored = self.inner.vault.load_credentials().await?;

				if let Some(pair) = stored.filter(CredentialPair::is_authenticated) {
					let device = self.inner.vault.device_identity().await?;
					let request = LogoutRequest {
						refresh_token: pair.refresh_token,
						device_id: device.device_id,
						access_token: Some(pair.access_token).filter(|token| !token.is_empty()),
					};

					if let Err(e) = self.inner.backend.logout(request).await {
						tracing::warn!(error = %e, "server-side logout failed; clearing locally");
					}
				}

				self.clear().await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Asks the backend whether the current credential is still accepted.
	///
	/// Returns `false` without a backend call when no valid credential is available.
	pub async fn validate_session(&self) -> Result<bool> {
		let Some(token) = self.get_valid_credential().await? else {
			return Ok(false);
		};

		Ok(self.inner.backend.validate(token).await?)
	}

	/// Returns `true` when a refresh token is stored.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.credentials().await?.is_some_and(|pair| pair.is_authenticated()))
	}

	/// Returns the stored pair without renewing it.
	pub async fn credentials(&self) -> Result<Option<CredentialPair>> {
		Ok(self.inner.vault.load_credentials().await?)
	}

	/// Returns the device identity, creating it on first access.
	pub async fn device_identity(&self) -> Result<DeviceIdentity> {
		Ok(self.inner.vault.device_identity().await?)
	}

	/// Event bus used for session notifications.
	pub fn events(&self) -> &SessionEventBus {
		&self.inner.events
	}

	/// Effective configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.inner.metrics
	}

	/// Failed attempts in the current flight; zero when no flight is running.
	pub fn retry_count(&self) -> u32 {
		self.inner.state.lock().retry_count()
	}

	/// Returns `true` while a refresh flight is unsettled.
	pub fn is_refreshing(&self) -> bool {
		self.inner.state.lock().is_refreshing()
	}

	/// Returns `true` when a background renewal is armed.
	pub fn has_scheduled_renewal(&self) -> bool {
		self.scheduled_renewal().is_some()
	}

	/// Instant at which the armed background renewal fires.
	pub fn scheduled_renewal(&self) -> Option<OffsetDateTime> {
		self.inner.state.lock().scheduled_renewal()
	}

	fn now(&self) -> OffsetDateTime {
		self.inner.clock.now()
	}
}
impl Debug for TokenCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCoordinator")
			.field("vault", &self.inner.vault)
			.field("config", &self.inner.config)
			.field("events", &self.inner.events)
			.finish()
	}
}

/// Builder for [`TokenCoordinator`].
pub struct TokenCoordinatorBuilder {
	store: Arc<dyn CredentialStore>,
	backend: Arc<dyn AuthBackend>,
	config: SessionConfig,
	strategy: Option<Arc<dyn FailureStrategy>>,
	events: Option<SessionEventBus>,
	clock: Option<Arc<dyn Clock>>,
}
impl TokenCoordinatorBuilder {
	/// Replaces the default configuration.
	pub fn config(mut self, config: SessionConfig) -> Self {
		self.config = config;

		self
	}

	/// Replaces the [`DefaultFailureStrategy`].
	pub fn strategy(mut self, strategy: Arc<dyn FailureStrategy>) -> Self {
		self.strategy = Some(strategy);

		self
	}

	/// Publishes onto an existing bus instead of a private one.
	pub fn events(mut self, events: SessionEventBus) -> Self {
		self.events = Some(events);

		self
	}

	/// Replaces the [`SystemClock`].
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Validates the configuration and builds the coordinator.
	pub fn build(self) -> Result<TokenCoordinator, ConfigError> {
		self.config.validate()?;

		let vault = CredentialVault::new(self.store, self.config.device_info.clone());

		Ok(TokenCoordinator {
			inner: Arc::new(CoordinatorInner {
				vault,
				backend: self.backend,
				strategy: self.strategy.unwrap_or_else(|| Arc::new(DefaultFailureStrategy)),
				events: self.events.unwrap_or_default(),
				clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
				config: self.config,
				metrics: RefreshMetrics::default(),
				state: Mutex::new(CoordinatorState::default()),
			}),
		})
	}
}
impl Debug for TokenCoordinatorBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCoordinatorBuilder").field("config", &self.config).finish()
	}
}

struct CoordinatorInner {
	vault: CredentialVault,
	backend: Arc<dyn AuthBackend>,
	strategy: Arc<dyn FailureStrategy>,
	events: SessionEventBus,
	clock: Arc<dyn Clock>,
	config: SessionConfig,
	metrics: RefreshMetrics,
	state: Mutex<CoordinatorState>,
}
impl Drop for CoordinatorInner {
	fn drop(&mut self) {
		self.state.get_mut().cancel_timer();
	}
}

fn record_result<T, E>(kind: FlowKind, result: &std::result::Result<T, E>) {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	obs::record_flow_outcome(kind, outcome);
}

fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}
