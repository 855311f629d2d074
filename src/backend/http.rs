//! [`AuthBackend`] implementation speaking the JSON contract over an [`HttpTransport`].

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
	backend::{AuthBackend, BackendFuture, LoginRequest, LogoutRequest, RefreshRequest},
	error::{BackendError, ConfigError},
	http::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport},
};

/// Auth backend rooted at a base URL; endpoint paths are joined beneath it.
pub struct HttpAuthBackend<T = ReqwestTransport>
where
	T: ?Sized + HttpTransport,
{
	base: Url,
	transport: Arc<T>,
}
impl HttpAuthBackend<ReqwestTransport> {
	/// Creates a backend that provisions its own reqwest transport.
	pub fn new(base: Url) -> Self {
		Self::with_transport(base, ReqwestTransport::default())
	}
}
impl<T> HttpAuthBackend<T>
where
	T: ?Sized + HttpTransport,
{
	/// Refresh endpoint path.
	pub const REFRESH_PATH: &'static str = "auth/refresh";
	/// Logout endpoint path.
	pub const LOGOUT_PATH: &'static str = "auth/logout";
	/// Validation endpoint path.
	pub const VALIDATE_PATH: &'static str = "auth/validate";

	/// Creates a backend that reuses a caller-provided transport.
	pub fn with_transport(mut base: Url, transport: impl Into<Arc<T>>) -> Self {
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		Self { base, transport: transport.into() }
	}

	/// Base URL with a trailing slash.
	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Resolves an endpoint path beneath the base URL.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { source })
	}

	async fn post_json<B>(
		&self,
		path: &str,
		body: &B,
		bearer: Option<TokenSecret>,
	) -> Result<ApiResponse, BackendError>
	where
		B: ?Sized + Serialize,
	{
		let mut request = ApiRequest::post(self.endpoint(path)?).with_json(body)?;

		if let Some(token) = bearer {
			request = request.with_bearer(token);
		}

		Ok(self.transport.execute(request).await?)
	}

	async fn exchange(&self, path: &str, body: &Value) -> Result<TokenGrant, BackendError> {
		let response = self.post_json(path, body, None).await?;

		if !response.is_success() {
			return Err(rejection(&response));
		}

		response.json()
	}
}
impl<T> AuthBackend for HttpAuthBackend<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh(&self, request: RefreshRequest) -> BackendFuture<'_, TokenGrant> {
		Box::pin(async move {
			let body = serde_json::to_value(&request).map_err(ConfigError::from)?;

			self.exchange(Self::REFRESH_PATH, &body).await
		})
	}

	fn login(&self, request: LoginRequest) -> BackendFuture<'_, TokenGrant> {
		Box::pin(async move { self.exchange(&request.path, &request.body).await })
	}

	fn logout(&self, request: LogoutRequest) -> BackendFuture<'_, ()> {
		Box::pin(async move {
			let bearer = request.access_token.clone();
			let response = self.post_json(Self::LOGOUT_PATH, &request, bearer).await?;

			if response.is_success() { Ok(()) } else { Err(rejection(&response)) }
		})
	}

	fn validate(&self, access_token: TokenSecret) -> BackendFuture<'_, bool> {
		Box::pin(async move {
			let request =
				ApiRequest::get(self.endpoint(Self::VALIDATE_PATH)?).with_bearer(access_token);
			let response = self.transport.execute(request).await?;

			match response.status {
				_ if response.is_success() => Ok(true),
				401 => Ok(false),
				_ => Err(rejection(&response)),
			}
		})
	}
}
impl<T> Debug for HttpAuthBackend<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpAuthBackend").field("base", &self.base.as_str()).finish()
	}
}

/// Builds a [`BackendError::Rejected`] from an error response.
///
/// Accepts `message` as a string or an array of strings and `code` or `error` as the structured
/// code; non-JSON bodies fall back to a body preview.
fn rejection(response: &ApiResponse) -> BackendError {
	let parsed = serde_json::from_slice::<Value>(&response.body).ok();
	let field = |name: &str| parsed.as_ref().and_then(|body| body.get(name));
	let message = field("message").and_then(|value| match value {
		Value::String(text) => Some(text.clone()),
		Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_owned),
		_ => None,
	});
	let code = field("code")
		.or_else(|| field("error"))
		.and_then(Value::as_str)
		.map(str::to_owned);
	let message = match (message, &parsed) {
		(None, None) if !response.body.is_empty() => Some(response.body_preview()),
		(message, _) => message,
	};

	BackendError::Rejected { status: response.status, code, message }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn backend(base: &str) -> HttpAuthBackend {
		HttpAuthBackend::new(Url::parse(base).expect("Fixture base URL should parse."))
	}

	#[test]
	fn endpoints_join_under_base_path() {
		let backend = backend("https://api.example.com/v1");

		assert_eq!(backend.base().as_str(), "https://api.example.com/v1/");
		assert_eq!(
			backend.endpoint("/auth/refresh").expect("Endpoint should join.").as_str(),
			"https://api.example.com/v1/auth/refresh"
		);
		assert_eq!(
			backend.endpoint(LoginRequest::DEFAULT_PATH).expect("Endpoint should join.").as_str(),
			"https://api.example.com/v1/auth/login"
		);
	}

	#[test]
	fn rejection_reads_message_and_code() {
		let response = ApiResponse::new(
			401,
			r#"{"statusCode":401,"message":"No active sessions","error":"Unauthorized"}"#,
		);

		match rejection(&response) {
			BackendError::Rejected { status, code, message } => {
				assert_eq!(status, 401);
				assert_eq!(code.as_deref(), Some("Unauthorized"));
				assert_eq!(message.as_deref(), Some("No active sessions"));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn rejection_accepts_message_arrays_and_plain_bodies() {
		let response = ApiResponse::new(400, "{\"message\":[\"refreshToken must be a string\"]}");

		assert!(matches!(
			rejection(&response),
			BackendError::Rejected { message: Some(m), .. } if m == "refreshToken must be a string"
		));

		let response = ApiResponse::new(502, "Bad Gateway");

		assert!(matches!(
			rejection(&response),
			BackendError::Rejected { status: 502, message: Some(m), .. } if m == "Bad Gateway"
		));
	}
}
