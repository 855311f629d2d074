//! Refresh failure classification.
//!
//! Whether a refresh failure ends the session is decided in exactly one place: a
//! [`FailureStrategy`]. The default strategy prefers a structured `code` field and falls back to
//! the free-text `message` values the backend currently emits. Only 401 responses can be
//! permanent; network failures and every other status are transient.

// self
use crate::{_prelude::*, error::BackendError, error::RefreshFailure, events::SessionEvent};

/// Maps backend failures into the permanent/transient taxonomy.
pub trait FailureStrategy
where
	Self: Send + Sync,
{
	/// Classifies a failed refresh call.
	fn classify_refresh_error(&self, ctx: &RefreshErrorContext) -> RefreshErrorKind;
}

/// Canonical refresh failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshErrorKind {
	/// The session expired on the backend.
	SessionExpired,
	/// No active session exists for the refresh credential.
	SessionRevoked,
	/// The upstream identity provider login expired.
	ExternalAuthExpired,
	/// The refresh credential itself was rejected.
	InvalidToken,
	/// Infrastructure failure; retry with backoff.
	Transient,
}
impl RefreshErrorKind {
	/// Returns `true` when retrying cannot help.
	pub const fn is_permanent(self) -> bool {
		!matches!(self, RefreshErrorKind::Transient)
	}

	/// Event emitted when a failure of this kind ends the session.
	pub const fn terminal_event(self) -> Option<SessionEvent> {
		match self {
			RefreshErrorKind::SessionExpired | RefreshErrorKind::InvalidToken =>
				Some(SessionEvent::Expired),
			RefreshErrorKind::SessionRevoked => Some(SessionEvent::SessionRevoked),
			RefreshErrorKind::ExternalAuthExpired => Some(SessionEvent::ExternalAuthExpired),
			RefreshErrorKind::Transient => None,
		}
	}

	/// Converts a permanent kind into the failure handed to callers.
	pub fn into_failure(self, reason: impl Into<String>) -> Option<RefreshFailure> {
		let reason = reason.into();

		match self {
			RefreshErrorKind::SessionExpired => Some(RefreshFailure::SessionExpired { reason }),
			RefreshErrorKind::SessionRevoked => Some(RefreshFailure::SessionRevoked { reason }),
			RefreshErrorKind::ExternalAuthExpired =>
				Some(RefreshFailure::ExternalAuthExpired { reason }),
			RefreshErrorKind::InvalidToken => Some(RefreshFailure::InvalidToken { reason }),
			RefreshErrorKind::Transient => None,
		}
	}
}

/// Primitive facts about a failed refresh call, decoupled from any HTTP client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshErrorContext {
	/// HTTP status code, when a response was received.
	pub status: Option<u16>,
	/// Structured error code from the response body.
	pub code: Option<String>,
	/// Free-text `message` from the response body.
	pub message: Option<String>,
	/// Indicates the failure originated below HTTP (DNS, TCP, TLS, timeout).
	pub network_error: bool,
}
impl RefreshErrorContext {
	/// Human-readable reason used in [`RefreshFailure`] values.
	pub fn reason(&self) -> String {
		self.message
			.clone()
			.or_else(|| self.code.clone())
			.or_else(|| self.status.map(|status| format!("HTTP {status}")))
			.unwrap_or_else(|| "network failure".into())
	}
}
impl From<&BackendError> for RefreshErrorContext {
	fn from(err: &BackendError) -> Self {
		match err {
			BackendError::Rejected { status, code, message } => Self {
				status: Some(*status),
				code: code.clone(),
				message: message.clone(),
				network_error: false,
			},
			BackendError::ResponseParse { status, .. } =>
				Self { status: Some(*status), ..Self::default() },
			BackendError::Request(_) => Self::default(),
			BackendError::Transport(_) => Self { network_error: true, ..Self::default() },
		}
	}
}

/// Default classification rules.
///
/// Order: network failures and non-401 statuses are transient; then the structured `code`; then
/// the known `message` values; any other 401 means the refresh token is invalid.
#[derive(Debug, Default)]
pub struct DefaultFailureStrategy;
impl Display for DefaultFailureStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-failure-strategy")
	}
}
impl FailureStrategy for DefaultFailureStrategy {
	fn classify_refresh_error(&self, ctx: &RefreshErrorContext) -> RefreshErrorKind {
		if ctx.network_error || ctx.status != Some(401) {
			return RefreshErrorKind::Transient;
		}

		ctx.code
			.as_deref()
			.and_then(classify_code)
			.or_else(|| ctx.message.as_deref().and_then(classify_message))
			.unwrap_or(RefreshErrorKind::InvalidToken)
	}
}

fn classify_code(code: &str) -> Option<RefreshErrorKind> {
	match code.trim().to_ascii_uppercase().as_str() {
		"SESSION_EXPIRED" => Some(RefreshErrorKind::SessionExpired),
		"SESSION_REVOKED" | "NO_ACTIVE_SESSIONS" => Some(RefreshErrorKind::SessionRevoked),
		"EXTERNAL_AUTH_EXPIRED" => Some(RefreshErrorKind::ExternalAuthExpired),
		"INVALID_REFRESH_TOKEN" | "INVALID_TOKEN" => Some(RefreshErrorKind::InvalidToken),
		_ => None,
	}
}

fn classify_message(message: &str) -> Option<RefreshErrorKind> {
	let lowered = message.trim().to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("no active sessions") => Some(RefreshErrorKind::SessionRevoked),
		text if text.contains("telegram authentication expired") =>
			Some(RefreshErrorKind::ExternalAuthExpired),
		text if text.contains("session expired") => Some(RefreshErrorKind::SessionExpired),
		_ => None,
	}
}
