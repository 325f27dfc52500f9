// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Integration tests for the authentication flow and the gated API.
//!
//! Tests cover:
//! - Login redirect construction (PKCE parameters, state)
//! - Redirect destination allow-listing
//! - Callback state validation
//! - Handoff code exchange and session cookie attributes
//! - Policy gates on API routes (role, price window, approval limit)
//! - Session refresh and logout

use axum::{
	body::Body,
	http::{
		header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
		Request, StatusCode,
	},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use tower::ServiceExt;
use warden_handoff::HandoffTokens;
use warden_oidc::OidcConfig;
use warden_policy::PolicyConfig;
use warden_server::{create_app_state, create_router, AppState, ServerConfig};

fn test_oidc_config() -> OidcConfig {
	// Port 9 (discard) never answers; exchange attempts fail fast.
	OidcConfig {
		authorize_endpoint: "http://127.0.0.1:9/authorize".to_string(),
		token_endpoint: "http://127.0.0.1:9/token".to_string(),
		revocation_endpoint: None,
		client_id: "test-client".to_string(),
		client_secret: "test-secret".into(),
		redirect_uri: "http://127.0.0.1:8080/auth/callback".to_string(),
		scopes: vec!["openid".to_string(), "profile".to_string()],
	}
}

fn setup_test_app() -> axum::Router {
	create_router(create_app_state(ServerConfig::default()))
}

fn setup_test_app_with_state() -> (axum::Router, AppState) {
	let state = create_app_state(ServerConfig::default());
	(create_router(state.clone()), state)
}

fn setup_with_provider() -> (axum::Router, AppState) {
	let mut config = ServerConfig::default();
	config.oidc = Some(test_oidc_config());
	let state = create_app_state(config);
	(create_router(state.clone()), state)
}

/// Unsigned JWT in compact form; extraction never verifies signatures.
fn make_jwt(payload: Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
	let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
	format!("{header}.{body}.test-signature")
}

async fn read_json(response: axum::response::Response) -> Value {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

async fn issue_handoff(state: &AppState, payload: Value, redirect: Option<&str>) -> String {
	state
		.handoff
		.issue(
			HandoffTokens {
				access_token: make_jwt(payload).into(),
				refresh_token: None,
				token_type: "Bearer".to_string(),
				expires_in: Some(3600),
			},
			redirect.map(str::to_string),
		)
		.await
		.unwrap()
		.code
}

/// Runs the handoff exchange and returns the `name=value` cookie pair.
async fn establish_session(app: &axum::Router, state: &AppState, payload: Value) -> String {
	let code = issue_handoff(state, payload, None).await;
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/session")
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "code": code }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let cookie = response
		.headers()
		.get(SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap();
	cookie.split(';').next().unwrap().to_string()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_registered_policies() {
	let app = setup_test_app();

	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = read_json(response).await;
	assert_eq!(body["status"], "ok");
	assert_eq!(body["components"]["store"], "ok");
	// No provider configured is a deployment choice, not an outage
	assert_eq!(body["components"]["identity_provider"], "not_configured");
	let policies = body["policies"].as_array().unwrap();
	assert!(policies.iter().any(|p| p == "profile:view"));
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_without_provider_config_returns_501() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/login")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_login_redirects_with_pkce_parameters() {
	let (app, _state) = setup_with_provider();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/login")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::SEE_OTHER);
	let location = response
		.headers()
		.get(LOCATION)
		.unwrap()
		.to_str()
		.unwrap();
	assert!(location.starts_with("http://127.0.0.1:9/authorize"));
	assert!(location.contains("client_id=test-client"));
	assert!(location.contains("code_challenge="));
	assert!(location.contains("code_challenge_method=S256"));
	assert!(location.contains("state="));
	assert!(location.contains("response_type=code"));
}

#[tokio::test]
async fn test_login_rejects_destination_outside_allow_list() {
	let (app, state) = setup_with_provider();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/login?redirect_uri=https://evil.example/phish")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::SEE_OTHER);

	// The parked flow record holds the sanitized destination
	let location = response
		.headers()
		.get(LOCATION)
		.unwrap()
		.to_str()
		.unwrap();
	let url = url::Url::parse(location).unwrap();
	let flow_state = url
		.query_pairs()
		.find(|(name, _)| name == "state")
		.map(|(_, value)| value.to_string())
		.unwrap();
	let record = state.pkce.complete(&flow_state).await.unwrap().unwrap();
	assert_eq!(record.redirect_uri, "/");
}

// ============================================================================
// Callback
// ============================================================================

#[tokio::test]
async fn test_callback_without_provider_config_returns_501() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/callback?code=abc&state=xyz")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_callback_with_unknown_state_returns_400() {
	let (app, _state) = setup_with_provider();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/callback?code=abc&state=never-issued")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body = read_json(response).await;
	assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn test_callback_with_provider_error_returns_400() {
	let (app, _state) = setup_with_provider();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/callback?error=access_denied&error_description=user+cancelled")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body = read_json(response).await;
	assert_eq!(body["error"], "authorization_failed");
}

#[tokio::test]
async fn test_callback_without_code_or_state_returns_400() {
	let (app, _state) = setup_with_provider();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/auth/callback")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body = read_json(response).await;
	assert_eq!(body["error"], "invalid_callback");
}

// ============================================================================
// Session creation via handoff codes
// ============================================================================

#[tokio::test]
async fn test_session_with_unknown_code_returns_400() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/session")
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "code": "tx_never-issued" }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	let body = read_json(response).await;
	assert_eq!(body["error"], "invalid_code");
}

#[tokio::test]
async fn test_handoff_exchange_sets_secure_session_cookie() {
	let (app, state) = setup_test_app_with_state();
	let code = issue_handoff(
		&state,
		json!({"sub": "user-1", "preferred_username": "nova", "roles": ["manager"]}),
		Some("/dashboard"),
	)
	.await;

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/session")
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "code": code }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);

	let cookie = response
		.headers()
		.get(SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap()
		.to_string();
	assert!(cookie.starts_with("warden_sid=sid_"));
	assert!(cookie.contains("HttpOnly"));
	assert!(cookie.contains("SameSite=Lax"));
	assert!(cookie.contains("Secure"));
	assert!(cookie.contains("Max-Age="));

	let body = read_json(response).await;
	assert_eq!(body["user_id"], "user-1");
	assert_eq!(body["username"], "nova");
	assert_eq!(body["redirect"], "/dashboard");
	assert_eq!(body["roles"], json!(["manager"]));
}

#[tokio::test]
async fn test_handoff_code_is_single_use() {
	let (app, state) = setup_test_app_with_state();
	let code = issue_handoff(&state, json!({"sub": "user-1"}), None).await;

	let first = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/session")
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "code": code }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(first.status(), StatusCode::OK);

	let second = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/session")
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "code": code }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(second.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Policy gates
// ============================================================================

#[tokio::test]
async fn test_me_without_session_is_denied_with_policy_payload() {
	let app = setup_test_app();

	let response = app
		.oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let body = read_json(response).await;
	assert_eq!(body["error"], "forbidden");
	assert_eq!(body["policy"], "profile:view");
	assert_eq!(body["method"], "GET");
	assert_eq!(body["path"], "/api/me");
	assert!(body["reason"].is_string());
}

#[tokio::test]
async fn test_me_with_session_returns_profile() {
	let (app, state) = setup_test_app_with_state();
	let cookie = establish_session(
		&app,
		&state,
		json!({"sub": "user-1", "preferred_username": "nova", "roles": ["manager"]}),
	)
	.await;

	let response = app
		.oneshot(
			Request::builder()
				.uri("/api/me")
				.header(COOKIE, cookie)
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = read_json(response).await;
	assert_eq!(body["user_id"], "user-1");
	assert_eq!(body["roles"], json!(["manager"]));
	assert!(body["session"]["created_at"].is_string());
}

#[tokio::test]
async fn test_artworks_narrowed_by_default_price_window() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.uri("/api/artworks")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = read_json(response).await;
	let artworks = body["artworks"].as_array().unwrap();
	assert!(artworks
		.iter()
		.all(|artwork| artwork["price"].as_i64().unwrap() <= 5_000_000));
	assert!(!artworks.iter().any(|artwork| artwork["id"] == "art-004"));
}

#[tokio::test]
async fn test_artworks_window_widens_with_role_config() {
	let mut config = ServerConfig::default();
	config.policy.roles.insert(
		"vip".to_string(),
		PolicyConfig {
			max_price: Some(50_000_000),
			..Default::default()
		},
	);
	let state = create_app_state(config);
	let app = create_router(state.clone());

	let cookie = establish_session(&app, &state, json!({"sub": "user-2", "roles": ["vip"]})).await;

	let response = app
		.oneshot(
			Request::builder()
				.uri("/api/artworks")
				.header(COOKIE, cookie)
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = read_json(response).await;
	let artworks = body["artworks"].as_array().unwrap();
	assert!(artworks.iter().any(|artwork| artwork["id"] == "art-004"));
}

// ============================================================================
// Order approval (amount-aware evaluation)
// ============================================================================

fn setup_with_manager_limit() -> (axum::Router, AppState) {
	let mut config = ServerConfig::default();
	config.policy.roles.insert(
		"manager".to_string(),
		PolicyConfig {
			approval_limit: Some(1_000_000),
			..Default::default()
		},
	);
	let state = create_app_state(config);
	(create_router(state.clone()), state)
}

#[tokio::test]
async fn test_order_approval_requires_submit_role() {
	let (app, state) = setup_test_app_with_state();
	let cookie = establish_session(&app, &state, json!({"sub": "user-3", "roles": ["buyer"]})).await;

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/orders/approve")
				.header(COOKIE, cookie)
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "amount": 100 }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let body = read_json(response).await;
	assert_eq!(body["policy"], "orders:submit");
}

#[tokio::test]
async fn test_order_approval_within_limit_succeeds() {
	let (app, state) = setup_with_manager_limit();
	let cookie =
		establish_session(&app, &state, json!({"sub": "user-4", "roles": ["manager"]})).await;

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/orders/approve")
				.header(COOKIE, cookie)
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "amount": 250_000 }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
	let body = read_json(response).await;
	assert_eq!(body["status"], "approved");
	assert_eq!(body["approval_ceiling"], 1_000_000);
}

#[tokio::test]
async fn test_order_approval_over_limit_is_denied() {
	let (app, state) = setup_with_manager_limit();
	let cookie =
		establish_session(&app, &state, json!({"sub": "user-4", "roles": ["manager"]})).await;

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/orders/approve")
				.header(COOKIE, cookie)
				.header(CONTENT_TYPE, "application/json")
				.body(Body::from(json!({ "amount": 2_000_000 }).to_string()))
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::FORBIDDEN);
	let body = read_json(response).await;
	assert_eq!(body["policy"], "orders:approve");
	assert!(body["reason"]
		.as_str()
		.unwrap()
		.contains("exceeds the approval limit"));
}

// ============================================================================
// Refresh and logout
// ============================================================================

#[tokio::test]
async fn test_refresh_without_session_returns_401() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/refresh")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_cookie_and_invalidates_session() {
	let (app, state) = setup_test_app_with_state();
	let cookie = establish_session(
		&app,
		&state,
		json!({"sub": "user-5", "roles": ["manager"]}),
	)
	.await;

	let logout = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/logout")
				.header(COOKIE, cookie.clone())
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(logout.status(), StatusCode::OK);
	let cleared = logout
		.headers()
		.get(SET_COOKIE)
		.unwrap()
		.to_str()
		.unwrap();
	assert!(cleared.contains("Max-Age=0"));

	// The old cookie no longer authenticates
	let me = app
		.oneshot(
			Request::builder()
				.uri("/api/me")
				.header(COOKIE, cookie)
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(me.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_without_session_still_succeeds() {
	let app = setup_test_app();

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/auth/logout")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::OK);
}
