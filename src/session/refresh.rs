//! Single-flight refresh with bounded exponential backoff.

// self
use super::{TokenCoordinator, record_result, state::FlightOutcome, to_std};
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenGrant, TokenSecret},
	backend::{RefreshErrorContext, RefreshRequest},
	error::RefreshFailure,
	events::SessionEvent,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CompareAndSwapOutcome,
};

impl TokenCoordinator {
	/// Exchanges the stored refresh token for a new pair.
	///
	/// Concurrent callers share one flight: the first caller drives the backend exchange, later
	/// callers await the same outcome. Transient failures are retried with backoff up to the
	/// attempt budget. A permanent failure clears the stored pair and emits one terminal event,
	/// unless a newer session replaced that pair while the flight was running.
	pub async fn refresh(&self) -> Result<TokenSecret> {
		let (flight, leader) = self.inner.state.lock().join_or_start();

		if !leader {
			self.inner.metrics.record_joined();

			tracing::debug!("joining in-flight refresh");
		}

		let outcome = flight.get_or_init(|| self.run_flight()).await.clone();

		self.inner.state.lock().settle(&flight);

		Ok(outcome?)
	}

	async fn run_flight(&self) -> FlightOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span.instrument(self.refresh_with_retries()).await;

		self.inner.state.lock().set_retry_count(0);

		record_result(KIND, &outcome);

		outcome
	}

	async fn refresh_with_retries(&self) -> FlightOutcome {
		let inner = &self.inner;
		let Some(current) =
			inner.vault.load_credentials().await?.filter(CredentialPair::is_authenticated)
		else {
			tracing::debug!("refresh requested without a stored refresh token");

			return Err(RefreshFailure::NotAuthenticated);
		};
		let device = inner.vault.device_identity().await?;
		let mut attempt = 0;

		loop {
			attempt += 1;

			inner.metrics.record_attempt();

			let request = RefreshRequest {
				refresh_token: current.refresh_token.clone(),
				device_id: device.device_id.clone(),
			};
			let err = match inner.backend.refresh(request).await {
				Ok(grant) => {
					inner.metrics.record_success();

					return self.complete_rotation(&current.refresh_token, grant).await;
				},
				Err(e) => e,
			};

			inner.metrics.record_failure();

			let ctx = RefreshErrorContext::from(&err);
			let kind = inner.strategy.classify_refresh_error(&ctx);

			if let Some(failure) = kind.into_failure(ctx.reason()) {
				let vault = &inner.vault;

				return match vault.clear_credentials_if_current(&current.refresh_token).await? {
					CompareAndSwapOutcome::Updated => {
						tracing::warn!(
							attempt,
							kind = ?kind,
							error = %err,
							"refresh rejected; ending session"
						);

						self.cancel_renewal();

						if let Some(event) = kind.terminal_event() {
							inner.events.emit(&event);
						}

						Err(failure)
					},
					CompareAndSwapOutcome::Mismatch => {
						tracing::debug!(
							kind = ?kind,
							"rejected refresh token was already replaced; keeping session"
						);

						self.current_access_token().await
					},
					CompareAndSwapOutcome::Missing => {
						tracing::debug!("credentials cleared during refresh; nothing to end");

						Err(RefreshFailure::SessionCleared)
					},
				};
			}

			let delay = inner.config.backoff_delay(attempt);

			inner.state.lock().set_retry_count(attempt);

			tracing::warn!(attempt, ?delay, error = %err, "refresh attempt failed transiently");

			inner.events.emit(&SessionEvent::RefreshFailedTransient { attempt, delay });

			if attempt >= inner.config.max_attempts {
				tracing::error!(
					attempts = attempt,
					"refresh attempts exhausted; keeping credentials"
				);

				inner.events.emit(&SessionEvent::NetworkError { attempts: attempt });

				return Err(RefreshFailure::Exhausted {
					attempts: attempt,
					last_error: err.to_string(),
				});
			}

			tokio::time::sleep(to_std(delay)).await;
		}
	}

	/// Stores the rotated pair unless the session changed underneath the flight.
	async fn complete_rotation(&self, used: &TokenSecret, grant: TokenGrant) -> FlightOutcome {
		let inner = &self.inner;
		let renewed = CredentialPair::from_grant(grant, self.now())
			.map_err(|e| RefreshFailure::MalformedGrant { reason: e.to_string() })?;

		match inner.vault.rotate_credentials(used, &renewed).await? {
			CompareAndSwapOutcome::Updated => {
				tracing::info!(expires_at = %renewed.expires_at, "credential pair renewed");

				self.arm_renewal(&renewed);
				inner.events.emit(&SessionEvent::Renewed { expires_at: renewed.expires_at });

				Ok(renewed.access_token)
			},
			CompareAndSwapOutcome::Mismatch => {
				tracing::debug!("stored session changed during refresh; discarding rotated pair");

				self.current_access_token().await
			},
			CompareAndSwapOutcome::Missing => {
				tracing::debug!("credentials cleared during refresh; discarding rotated pair");

				Err(RefreshFailure::SessionCleared)
			},
		}
	}

	/// Access token of the session that replaced the one this flight started from.
	async fn current_access_token(&self) -> FlightOutcome {
		match self.inner.vault.load_credentials().await? {
			Some(pair) if !pair.access_token.is_empty() => Ok(pair.access_token),
			_ => Err(RefreshFailure::SessionCleared),
		}
	}
}
