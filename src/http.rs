//! Transport primitives shared by the auth backend and the request interceptor.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests are modeled as
//! owned, cloneable [`ApiRequest`] values so the interceptor can replay a call after refreshing
//! its credential; [`ReqwestTransport`] is the default implementation.

// crates.io
use reqwest::{
	Method,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{BackendError, ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Executes fully described requests and returns buffered responses.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared by the
/// backend client and any number of interceptors.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request, attaching `Authorization: Bearer <token>` when a credential is present.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Owned, replayable request description.
#[derive(Clone)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Extra headers; `Authorization` is derived from the credential instead.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	credential: Option<TokenSecret>,
	credential_override: bool,
	replayed: bool,
}
impl ApiRequest {
	/// Creates a request without body or credential.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			headers: HeaderMap::new(),
			body: None,
			credential: None,
			credential_override: false,
			replayed: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Adds a header, replacing any previous value with the same name.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Encodes `payload` as the JSON body and sets the content type.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Pins an explicit credential; the interceptor will not replace it before sending.
	pub fn with_bearer(mut self, token: TokenSecret) -> Self {
		self.credential = Some(token);
		self.credential_override = true;

		self
	}

	/// Credential that will be sent, if any.
	pub fn credential(&self) -> Option<&TokenSecret> {
		self.credential.as_ref()
	}

	/// Returns `true` when the caller pinned the credential explicitly.
	pub fn has_credential_override(&self) -> bool {
		self.credential_override
	}

	/// Returns `true` once the request has been replayed after a refresh.
	pub fn is_replay(&self) -> bool {
		self.replayed
	}

	/// Value of the `Authorization` header this request will carry.
	pub fn authorization(&self) -> Option<String> {
		self.credential.as_ref().filter(|token| !token.is_empty()).map(TokenSecret::bearer)
	}

	pub(crate) fn attach_credential(&mut self, token: Option<TokenSecret>) {
		self.credential = token;
	}

	pub(crate) fn into_replay(mut self, token: TokenSecret) -> Self {
		self.credential = Some(token);
		self.replayed = true;

		self
	}
}
impl Debug for ApiRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("credential_set", &self.credential.is_some())
			.field("credential_override", &self.credential_override)
			.field("replayed", &self.replayed)
			.finish()
	}
}

/// Buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for the canonical unauthorized status.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T, BackendError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| BackendError::ResponseParse { source, status: self.status })
	}

	/// Lossy, length-limited preview of the body for error messages.
	pub fn body_preview(&self) -> String {
		truncate_preview(String::from_utf8_lossy(&self.body).into_owned())
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a request timeout.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}
}
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut headers = request.headers.clone();

			if let Some(value) = request.authorization() {
				let value = HeaderValue::from_str(&value).map_err(TransportError::network)?;

				headers.insert(AUTHORIZATION, value);
			}

			let mut builder = client.request(request.method, request.url).headers(headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}

const BODY_PREVIEW_LIMIT: usize = 256;

pub(crate) fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}

		buf.push(ch);
	}

	buf
}
