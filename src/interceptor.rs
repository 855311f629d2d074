//! Authenticated request pipeline.
//!
//! [`RequestInterceptor`] attaches the current access credential to outbound requests and, when a
//! response comes back `401`, performs one coordinated refresh and replays the request once.
//! Concurrent rejections share the coordinator's single refresh flight.

// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::TokenCoordinator,
};

/// Sends requests through an [`HttpTransport`] with credential attach and refresh-on-401.
pub struct RequestInterceptor<T = ReqwestTransport>
where
	T: ?Sized + HttpTransport,
{
	coordinator: TokenCoordinator,
	transport: Arc<T>,
}
impl<T> RequestInterceptor<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wraps a transport with the coordinator's credential handling.
	pub fn new(coordinator: TokenCoordinator, transport: impl Into<Arc<T>>) -> Self {
		Self { coordinator, transport: transport.into() }
	}

	/// Coordinator supplying credentials.
	pub fn coordinator(&self) -> &TokenCoordinator {
		&self.coordinator
	}

	/// Sends `request`.
	///
	/// The coordinator's credential is attached unless the request pins its own via
	/// [`ApiRequest::with_bearer`]; requests without any credential are sent unauthenticated.
	/// A `401` triggers at most one refresh-and-replay. Every other status, success or not, is
	/// returned to the caller as-is.
	pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if !request.has_credential_override() {
					request.attach_credential(self.coordinator.get_valid_credential().await?);
				}

				let response = self.transport.execute(request.clone()).await?;

				if !response.is_unauthorized() || request.is_replay() {
					return Ok(response);
				}

				self.retry_unauthorized(request, response).await
			})
			.await;
		let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

		obs::record_flow_outcome(KIND, outcome);

		result
	}

	async fn retry_unauthorized(
		&self,
		request: ApiRequest,
		rejected: ApiResponse,
	) -> Result<ApiResponse> {
		tracing::debug!(url = %request.url, "request rejected as unauthorized; refreshing");

		let token = match self.coordinator.refresh().await {
			Ok(token) => token,
			Err(e) => {
				tracing::debug!(error = %e, "refresh after 401 failed; surfacing the rejection");

				return Err(Error::Unauthorized { reason: unauthorized_reason(&rejected) });
			},
		};
		let response = self.transport.execute(request.into_replay(token)).await?;

		if response.is_unauthorized() {
			tracing::warn!("replayed request was rejected again");

			return Err(Error::Unauthorized { reason: unauthorized_reason(&response) });
		}

		Ok(response)
	}
}
impl<T> Debug for RequestInterceptor<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestInterceptor").field("coordinator", &self.coordinator).finish()
	}
}

fn unauthorized_reason(response: &ApiResponse) -> String {
	if response.body.is_empty() {
		format!("HTTP {}", response.status)
	} else {
		response.body_preview()
	}
}
