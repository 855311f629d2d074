//! Auth backend contract and the default HTTP implementation.
//!
//! The coordinator consumes a fixed request/response contract: refresh, login, logout, and token
//! validation. [`AuthBackend`] is that contract; [`HttpAuthBackend`] speaks it over any
//! [`HttpTransport`](crate::http::HttpTransport). Classification of refresh failures into
//! permanent and transient lives in [`FailureStrategy`].

pub mod http;
pub mod strategy;

pub use self::{http::*, strategy::*};

// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
	error::BackendError,
};

/// Boxed future returned by [`AuthBackend`] operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + 'a + Send>>;

/// Backend endpoints consumed by the session core.
pub trait AuthBackend
where
	Self: Send + Sync,
{
	/// `POST /auth/refresh`; the refresh token is rotated on every success.
	fn refresh(&self, request: RefreshRequest) -> BackendFuture<'_, TokenGrant>;

	/// `POST /auth/login` (or a provider-specific path) returning a fresh grant.
	fn login(&self, request: LoginRequest) -> BackendFuture<'_, TokenGrant>;

	/// `POST /auth/logout`; best-effort server-side invalidation.
	fn logout(&self, request: LogoutRequest) -> BackendFuture<'_, ()>;

	/// `GET /auth/validate`; `true` when the backend still accepts the access token.
	fn validate(&self, access_token: TokenSecret) -> BackendFuture<'_, bool>;
}

/// Body of `POST /auth/refresh`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
	/// Refresh credential being exchanged.
	pub refresh_token: TokenSecret,
	/// Stable device identifier.
	pub device_id: String,
}
impl Debug for RefreshRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshRequest")
			.field("refresh_token", &"<redacted>")
			.field("device_id", &self.device_id)
			.finish()
	}
}

/// Body of `POST /auth/logout`; the access token travels as the bearer header.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
	/// Refresh credential to invalidate.
	pub refresh_token: TokenSecret,
	/// Stable device identifier.
	pub device_id: String,
	/// Access credential sent as `Authorization`, when still present.
	#[serde(skip)]
	pub access_token: Option<TokenSecret>,
}
impl Debug for LogoutRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LogoutRequest")
			.field("refresh_token", &"<redacted>")
			.field("device_id", &self.device_id)
			.field("access_token_set", &self.access_token.is_some())
			.finish()
	}
}

/// Provider-specific login exchange. The body shape is owned by the application.
#[derive(Clone, Debug)]
pub struct LoginRequest {
	/// Path relative to the backend base URL.
	pub path: String,
	/// JSON body; object bodies get a `deviceId` field when missing.
	pub body: serde_json::Value,
}
impl LoginRequest {
	/// Default login path.
	pub const DEFAULT_PATH: &'static str = "auth/login";

	/// Creates a request against the default login path.
	pub fn new(body: serde_json::Value) -> Self {
		Self { path: Self::DEFAULT_PATH.into(), body }
	}

	/// Overrides the login path (e.g. a provider-specific endpoint).
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Inserts `deviceId` into object bodies that do not carry one yet.
	pub fn with_device_id(mut self, device_id: &str) -> Self {
		if let serde_json::Value::Object(map) = &mut self.body {
			map.entry("deviceId").or_insert_with(|| device_id.into());
		}

		self
	}
}
