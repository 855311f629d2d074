//! Coordinator tuning knobs.

// self
use crate::{_prelude::*, auth::default_device_info, error::ConfigError};

/// Timing and identity settings for a [`TokenCoordinator`](crate::session::TokenCoordinator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// How long before expiry the access credential is renewed.
	pub refresh_buffer: Duration,
	/// Backend calls per refresh flight, including the first.
	pub max_attempts: u32,
	/// Delay after the first transient failure; doubles per attempt.
	pub backoff_base: Duration,
	/// Upper bound for any single backoff delay.
	pub backoff_cap: Duration,
	/// Description attached to the device identity.
	pub device_info: String,
}
impl SessionConfig {
	/// Default renewal buffer.
	pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::minutes(10);
	/// Default attempt budget per refresh flight.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default first backoff delay.
	pub const DEFAULT_BACKOFF_BASE: Duration = Duration::seconds(1);
	/// Default backoff ceiling.
	pub const DEFAULT_BACKOFF_CAP: Duration = Duration::seconds(10);

	/// Overrides the renewal buffer.
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer;

		self
	}

	/// Overrides the attempt budget.
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts;

		self
	}

	/// Overrides the backoff base and cap.
	pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
		self.backoff_base = base;
		self.backoff_cap = cap;

		self
	}

	/// Overrides the device description.
	pub fn with_device_info(mut self, info: impl Into<String>) -> Self {
		self.device_info = info.into();

		self
	}

	/// Rejects settings the coordinator cannot honor.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}
		if !self.backoff_base.is_positive() {
			return Err(ConfigError::NonPositiveBackoff);
		}
		if self.backoff_cap < self.backoff_base {
			return Err(ConfigError::BackoffCapBelowBase);
		}
		if self.refresh_buffer.is_negative() {
			return Err(ConfigError::NegativeRefreshBuffer);
		}

		Ok(())
	}

	/// Backoff for the 1-based `attempt`: `min(base * 2^(attempt - 1), cap)`.
	pub fn backoff_delay(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(30);

		self.backoff_base
			.checked_mul(1_i32 << exponent)
			.unwrap_or(self.backoff_cap)
			.min(self.backoff_cap)
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			refresh_buffer: Self::DEFAULT_REFRESH_BUFFER,
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			backoff_base: Self::DEFAULT_BACKOFF_BASE,
			backoff_cap: Self::DEFAULT_BACKOFF_CAP,
			device_info: default_device_info(),
		}
	}
}
