//! Shared fixtures for integration tests: a scripted backend, a scripted transport, an event
//! recorder, and a clock that follows Tokio's paused time.

#![allow(dead_code, unused_imports)]

pub use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};

pub use parking_lot::Mutex;
pub use serde_json::json;
pub use session_broker::{
	auth::{CredentialPair, TokenGrant, TokenSecret},
	backend::{AuthBackend, BackendFuture, LoginRequest, LogoutRequest, RefreshRequest},
	error::{BackendError, ConfigError, Error, RefreshFailure, TransportError},
	events::{SessionEvent, SessionEventBus, Subscription},
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	interceptor::RequestInterceptor,
	session::{Clock, SessionConfig, TokenCoordinator},
	store::{CredentialStore, CredentialVault, MemoryStore, StoreKey},
};
pub use time::{Duration, OffsetDateTime, macros::datetime};
pub use url::Url;

/// Wall-clock origin for every paused-time test.
pub const ORIGIN: OffsetDateTime = datetime!(2025-11-10 12:00 UTC);

/// [`Clock`] anchored at [`ORIGIN`] that advances with Tokio's (possibly paused) clock.
pub struct TokioClock {
	start: tokio::time::Instant,
}
impl TokioClock {
	pub fn start() -> Arc<Self> {
		Arc::new(Self { start: tokio::time::Instant::now() })
	}
}
impl Clock for TokioClock {
	fn now(&self) -> OffsetDateTime {
		ORIGIN + self.start.elapsed()
	}
}

/// Canned answer for one backend refresh call.
#[derive(Clone, Debug)]
pub enum Reply {
	Grant(TokenGrant),
	Reject { status: u16, message: &'static str },
	Network,
}
impl Reply {
	pub fn grant(n: u32) -> Self {
		Self::Grant(TokenGrant::new(format!("access-{n}"), format!("refresh-{n}"), 3_600))
	}

	pub fn unauthorized(message: &'static str) -> Self {
		Self::Reject { status: 401, message }
	}

	fn into_result(self) -> Result<TokenGrant, BackendError> {
		match self {
			Reply::Grant(grant) => Ok(grant),
			Reply::Reject { status, message } =>
				Err(BackendError::Rejected { status, code: None, message: Some(message.into()) }),
			Reply::Network => Err(BackendError::from(TransportError::Timeout)),
		}
	}
}

/// [`AuthBackend`] that answers refreshes from a queue; an empty queue means network failure.
#[derive(Default)]
pub struct ScriptedBackend {
	replies: Mutex<VecDeque<Reply>>,
	delay: Option<StdDuration>,
	logout_fails: bool,
	pub refresh_calls: AtomicUsize,
	pub refresh_requests: Mutex<Vec<RefreshRequest>>,
	pub login_requests: Mutex<Vec<LoginRequest>>,
	pub logout_requests: Mutex<Vec<LogoutRequest>>,
	pub validate_calls: AtomicUsize,
}
impl ScriptedBackend {
	pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
		Self { replies: Mutex::new(replies.into_iter().collect()), ..Self::default() }
	}

	/// Every backend call waits this long before answering.
	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn with_failing_logout(mut self) -> Self {
		self.logout_fails = true;

		self
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	async fn pause(delay: Option<StdDuration>) {
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
	}
}
impl AuthBackend for ScriptedBackend {
	fn refresh(&self, request: RefreshRequest) -> BackendFuture<'_, TokenGrant> {
		self.refresh_calls.fetch_add(1, Ordering::SeqCst);
		self.refresh_requests.lock().push(request);

		let reply = self.replies.lock().pop_front().unwrap_or(Reply::Network);
		let delay = self.delay;

		Box::pin(async move {
			Self::pause(delay).await;

			reply.into_result()
		})
	}

	fn login(&self, request: LoginRequest) -> BackendFuture<'_, TokenGrant> {
		self.login_requests.lock().push(request);

		Box::pin(async { Ok(TokenGrant::new("access-login", "refresh-login", 3_600)) })
	}

	fn logout(&self, request: LogoutRequest) -> BackendFuture<'_, ()> {
		self.logout_requests.lock().push(request);

		let fails = self.logout_fails;

		Box::pin(async move {
			if fails { Err(BackendError::from(TransportError::Timeout)) } else { Ok(()) }
		})
	}

	fn validate(&self, access_token: TokenSecret) -> BackendFuture<'_, bool> {
		self.validate_calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(!access_token.is_empty()) })
	}
}

/// [`HttpTransport`] that answers 200 when the bearer matches `accept`, else `fallback_status`.
pub struct ScriptedTransport {
	accept: Option<String>,
	fallback_status: u16,
	pub seen: Mutex<Vec<ApiRequest>>,
}
impl ScriptedTransport {
	pub fn accepting(token: &str) -> Self {
		Self {
			accept: Some(format!("Bearer {token}")),
			fallback_status: 401,
			seen: Mutex::default(),
		}
	}

	pub fn answering(status: u16) -> Self {
		Self { accept: None, fallback_status: status, seen: Mutex::default() }
	}

	pub fn seen_authorizations(&self) -> Vec<Option<String>> {
		self.seen.lock().iter().map(ApiRequest::authorization).collect()
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let accepted = self.accept.is_some() && request.authorization() == self.accept;
		let response = if accepted {
			ApiResponse::new(200, "{\"ok\":true}")
		} else if self.fallback_status == 401 {
			ApiResponse::new(401, "{\"statusCode\":401,\"message\":\"Unauthorized\"}")
		} else {
			ApiResponse::new(self.fallback_status, "")
		};

		self.seen.lock().push(request);

		Box::pin(async move { Ok(response) })
	}
}

/// Records every event emitted on `bus`.
pub fn record_events(bus: &SessionEventBus) -> (Arc<Mutex<Vec<SessionEvent>>>, Subscription) {
	let log = Arc::new(Mutex::new(Vec::new()));
	let sink = log.clone();
	let subscription = bus.subscribe(move |event| sink.lock().push(event.clone()));

	(log, subscription)
}

/// Coordinator wired to in-memory collaborators and the paused Tokio clock.
pub struct Harness {
	pub coordinator: TokenCoordinator,
	pub store: MemoryStore,
	pub backend: Arc<ScriptedBackend>,
	pub clock: Arc<TokioClock>,
	pub events: Arc<Mutex<Vec<SessionEvent>>>,
	_subscription: Subscription,
}
impl Harness {
	pub fn new(backend: ScriptedBackend) -> Self {
		Self::with_config(backend, SessionConfig::default().with_device_info("test-device"))
	}

	pub fn with_config(backend: ScriptedBackend, config: SessionConfig) -> Self {
		let store = MemoryStore::default();
		let backend = Arc::new(backend);
		let clock = TokioClock::start();
		let coordinator = TokenCoordinator::builder(Arc::new(store.clone()), backend.clone())
			.config(config)
			.clock(clock.clone())
			.build()
			.expect("Coordinator fixture should build.");
		let (events, _subscription) = record_events(coordinator.events());

		Self { coordinator, store, backend, clock, events, _subscription }
	}

	/// Writes a pair straight into the store without arming background renewal.
	pub async fn seed(&self, access: &str, refresh: &str, lifetime: Duration) {
		let pair = CredentialPair {
			access_token: TokenSecret::new(access),
			refresh_token: TokenSecret::new(refresh),
			expires_at: self.clock.now() + lifetime,
			expires_in: lifetime,
		};

		CredentialVault::new(Arc::new(self.store.clone()), "test-device")
			.save_credentials(&pair)
			.await
			.expect("Seeding credentials should succeed.");
	}

	pub fn events(&self) -> Vec<SessionEvent> {
		self.events.lock().clone()
	}

	pub async fn stored(&self) -> Option<CredentialPair> {
		self.coordinator.credentials().await.expect("Loading credentials should succeed.")
	}
}
