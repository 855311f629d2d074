//! Crate-level error types shared by the coordinator, stores, backend, and interceptor.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Auth backend rejected or failed a login, logout, or validation call.
	#[error(transparent)]
	Backend(#[from] BackendError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential refresh failed; the same failure is shared by every joined caller.
	#[error(transparent)]
	Refresh(#[from] RefreshFailure),

	/// An authenticated call was still rejected after the refresh-and-replay budget.
	#[error("Request was rejected as unauthorized: {reason}.")]
	Unauthorized {
		/// Body preview or status summary returned by the backend.
		reason: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Backend base URL or endpoint path could not be joined.
	#[error("Backend endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded.")]
	RequestEncode(#[from] serde_json::Error),
	/// Refresh attempt budget must allow at least one call.
	#[error("The refresh attempt budget must be at least 1.")]
	ZeroAttempts,
	/// Backoff base must be strictly positive.
	#[error("The backoff base must be positive.")]
	NonPositiveBackoff,
	/// Backoff cap must not undercut the base delay.
	#[error("The backoff cap must be greater than or equal to the base delay.")]
	BackoffCapBelowBase,
	/// Refresh buffer must not be negative.
	#[error("The refresh buffer must not be negative.")]
	NegativeRefreshBuffer,
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expiresIn value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Failures reported by an [`AuthBackend`](crate::backend::AuthBackend) call.
#[derive(Debug, ThisError)]
pub enum BackendError {
	/// Backend answered with a non-success status.
	#[error(
		"Auth backend rejected the request with status {status}: {}.",
		.message.as_deref().unwrap_or("no message")
	)]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Structured error code, when the backend supplies one.
		code: Option<String>,
		/// Free-text `message` field from the response body.
		message: Option<String>,
	},
	/// Backend answered with a success status but a body that does not match the contract.
	#[error("Auth backend returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// The request could not be built locally.
	#[error(transparent)]
	Request(#[from] ConfigError),
	/// The request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl BackendError {
	/// Returns the HTTP status code, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::ResponseParse { status, .. } => Some(*status),
			Self::Request(_) | Self::Transport(_) => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request timed out before a response arrived.
	#[error("Request timed out while calling the backend.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Outcome of a failed refresh flight.
///
/// Cloneable so a single settled flight can hand the same failure to every caller that joined it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// No refresh credential is stored; the caller must authenticate.
	#[error("No refresh token is available; the session must be re-authenticated.")]
	NotAuthenticated,
	/// Backend reported the session as expired.
	#[error("Session expired: {reason}.")]
	SessionExpired {
		/// Backend-supplied message.
		reason: String,
	},
	/// Backend reported that no active session exists for the refresh token.
	#[error("Session revoked: {reason}.")]
	SessionRevoked {
		/// Backend-supplied message.
		reason: String,
	},
	/// Backend reported that the upstream identity provider login expired.
	#[error("External authentication expired: {reason}.")]
	ExternalAuthExpired {
		/// Backend-supplied message.
		reason: String,
	},
	/// Backend rejected the refresh token itself.
	#[error("Refresh token was rejected: {reason}.")]
	InvalidToken {
		/// Backend-supplied message.
		reason: String,
	},
	/// Every attempt failed transiently; stored credentials were left untouched.
	#[error("Refresh failed after {attempts} attempts: {last_error}.")]
	Exhausted {
		/// Number of backend calls made.
		attempts: u32,
		/// Display form of the final transient failure.
		last_error: String,
	},
	/// Credentials were cleared while the refresh was in flight; the result was discarded.
	#[error("Credentials were cleared while the refresh was in flight.")]
	SessionCleared,
	/// Backend answered the refresh with a grant that cannot be stored.
	#[error("Refresh returned an unusable grant: {reason}.")]
	MalformedGrant {
		/// Validation failure.
		reason: String,
	},
	/// Store failure during the flight.
	#[error(transparent)]
	Storage(#[from] crate::store::StoreError),
}
impl RefreshFailure {
	/// Returns `true` when the backend confirmed the session itself is no longer valid.
	pub fn is_permanent(&self) -> bool {
		matches!(
			self,
			Self::SessionExpired { .. }
				| Self::SessionRevoked { .. }
				| Self::ExternalAuthExpired { .. }
				| Self::InvalidToken { .. }
		)
	}
}
