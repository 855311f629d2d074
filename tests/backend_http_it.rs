mod common;

// crates.io
use httpmock::prelude::*;
use session_broker::{backend::HttpAuthBackend, http::ReqwestTransport};
// self
use common::*;

fn backend(server: &MockServer) -> HttpAuthBackend {
	HttpAuthBackend::new(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
}

#[tokio::test]
async fn refresh_posts_camel_case_body_and_decodes_grant() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.header("content-type", "application/json")
				.json_body(json!({ "refreshToken": "refresh-0", "deviceId": "device-1" }));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"access-1","refreshToken":"refresh-1","expiresIn":3600}"#);
		})
		.await;
	let grant = backend(&server)
		.refresh(RefreshRequest {
			refresh_token: TokenSecret::new("refresh-0"),
			device_id: "device-1".into(),
		})
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(grant.access_token.expose(), "access-1");
	assert_eq!(grant.refresh_token.expose(), "refresh-1");
	assert_eq!(grant.expires_in, 3_600);
}

#[tokio::test]
async fn refresh_rejection_carries_status_and_message() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"statusCode\":401,\"message\":\"No active sessions\"}");
		})
		.await;
	let err = backend(&server)
		.refresh(RefreshRequest { refresh_token: TokenSecret::new("stale"), device_id: "d".into() })
		.await
		.expect_err("A 401 should be reported as a rejection.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		BackendError::Rejected { status: 401, message: Some(ref m), .. }
			if m == "No active sessions"
	));
}

#[tokio::test]
async fn malformed_grant_reports_the_failing_field() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"accessToken\":\"a\",\"refreshToken\":\"r\",\"expiresIn\":\"soon\"}");
		})
		.await;
	let err = backend(&server)
		.refresh(RefreshRequest { refresh_token: TokenSecret::new("r0"), device_id: "d".into() })
		.await
		.expect_err("A mistyped field should fail to decode.");

	match err {
		BackendError::ResponseParse { source, status } => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "expiresIn");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn logout_sends_bearer_and_body() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/logout")
				.header("authorization", "Bearer access-0")
				.json_body(json!({ "refreshToken": "refresh-0", "deviceId": "device-1" }));
			then.status(200).body("{}");
		})
		.await;

	backend(&server)
		.logout(LogoutRequest {
			refresh_token: TokenSecret::new("refresh-0"),
			device_id: "device-1".into(),
			access_token: Some(TokenSecret::new("access-0")),
		})
		.await
		.expect("Logout should succeed.");

	mock.assert_async().await;
}

#[tokio::test]
async fn validate_maps_statuses() {
	let server = MockServer::start_async().await;
	let valid = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/validate").header("authorization", "Bearer good");
			then.status(200).body("{\"valid\":true}");
		})
		.await;
	let invalid = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/validate").header("authorization", "Bearer bad");
			then.status(401).body("{\"message\":\"Unauthorized\"}");
		})
		.await;
	let backend = backend(&server);

	assert!(backend.validate(TokenSecret::new("good")).await.expect("Validation should succeed."));
	assert!(!backend.validate(TokenSecret::new("bad")).await.expect("Validation should succeed."));

	valid.assert_async().await;
	invalid.assert_async().await;
}

#[tokio::test]
async fn coordinator_and_interceptor_over_http() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"access-0","refreshToken":"refresh-0","expiresIn":3600}"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"access-1","refreshToken":"refresh-1","expiresIn":3600}"#);
		})
		.await;
	let revoked = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer access-0");
			then.status(401).body("{\"message\":\"Unauthorized\"}");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer access-1");
			then.status(200).body("[]");
		})
		.await;
	let store = MemoryStore::default();
	let coordinator = TokenCoordinator::builder(Arc::new(store.clone()), Arc::new(backend(&server)))
		.build()
		.expect("Coordinator should build.");
	let pair = coordinator
		.login(LoginRequest::new(json!({ "initData": "query_id=1" })))
		.await
		.expect("Login should succeed.");

	login.assert_async().await;

	assert_eq!(pair.access_token.expose(), "access-0");

	let interceptor: RequestInterceptor =
		RequestInterceptor::new(coordinator.clone(), ReqwestTransport::default());
	let url = Url::parse(&server.url("/orders")).expect("Orders URL should parse.");
	let response = interceptor.send(ApiRequest::get(url)).await.expect("Replay should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(response.body, b"[]");

	revoked.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;

	assert_eq!(store.peek(StoreKey::RefreshToken).as_deref(), Some("refresh-1"));

	coordinator.dispose();
}
