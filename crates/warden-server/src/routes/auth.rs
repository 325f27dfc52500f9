// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Browser-facing authentication routes.
//!
//! The BFF owns the whole OAuth dance; the browser only ever sees opaque
//! values. One login runs:
//!
//! 1. `GET /auth/login` - park a PKCE record, send the browser to the
//!    provider's authorize endpoint.
//! 2. `GET /auth/callback` - redeem the `state` (one-time), exchange the
//!    authorization code with the proof verifier, park the tokens behind a
//!    `tx_` handoff code, and bounce the browser to its destination with
//!    only that code appended.
//! 3. `POST /auth/session` - redeem the handoff code (one-time), create
//!    the server-side session, and set the session cookie.
//!
//! Callback failures are deliberately uniform: an unknown, replayed, and
//! expired `state` all read "invalid or expired", so the endpoint is not
//! an oracle for which logins ever existed.

use axum::{
	extract::{Extension, Query, State},
	http::{header::SET_COOKIE, HeaderMap, StatusCode},
	response::{IntoResponse, Redirect, Response},
	Json,
};
use chrono::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use warden_handoff::HandoffTokens;
use warden_pkce::authorization_url;
use warden_server_config::SessionConfig;
use warden_session::{TokenSet, UserSession};

use crate::{
	api::AppState,
	audit::{AuditEvent, AuditEventType},
	error::{bad_gateway, bad_request, internal_error, provider_not_configured, unauthorized},
	session_middleware::capture_client_context,
};

#[derive(Debug, Deserialize)]
pub struct LoginParams {
	pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
	pub code: Option<String>,
	pub state: Option<String>,
	pub error: Option<String>,
	pub error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
	pub code: String,
}

/// Session metadata returned to the browser. Never contains tokens.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
	pub user_id: String,
	pub username: Option<String>,
	pub email: Option<String>,
	pub roles: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub token_expires_at: Option<DateTime<Utc>>,
	/// Destination recorded when the login began, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect: Option<String>,
}

impl SessionResponse {
	fn from_session(session: &UserSession, redirect: Option<String>) -> Self {
		Self {
			user_id: session.user_id.clone(),
			username: session.username.clone(),
			email: session.email.clone(),
			roles: session.roles.iter().cloned().collect(),
			created_at: session.created_at,
			token_expires_at: session.token_expires_at,
			redirect,
		}
	}
}

/// GET /auth/login - begin an authorization-code flow.
pub async fn login(State(state): State<AppState>, Query(params): Query<LoginParams>) -> Response {
	let Some(oidc) = state.oidc.as_ref() else {
		return provider_not_configured();
	};

	let destination = sanitize_redirect(
		params.redirect_uri.as_deref(),
		&state.config.http.allowed_redirects,
	);

	let record = match state.pkce.begin(&destination).await {
		Ok(record) => record,
		Err(err) => {
			tracing::error!(error = %err, "failed to begin login flow");
			return internal_error();
		}
	};

	let config = oidc.config();
	let url = match authorization_url(
		&config.authorize_endpoint,
		&config.client_id,
		&config.redirect_uri,
		&config.scopes_string(),
		&record,
	) {
		Ok(url) => url,
		Err(err) => {
			tracing::error!(error = %err, "failed to build authorization url");
			return internal_error();
		}
	};

	tracing::debug!(destination = %destination, "redirecting browser to the identity provider");
	Redirect::to(url.as_str()).into_response()
}

/// GET /auth/callback - provider redirect target.
pub async fn callback(
	State(state): State<AppState>,
	Query(params): Query<CallbackParams>,
) -> Response {
	let Some(oidc) = state.oidc.as_ref() else {
		return provider_not_configured();
	};

	if let Some(error) = params.error {
		tracing::warn!(
			error = %error,
			description = params.error_description.as_deref().unwrap_or("-"),
			"identity provider rejected the authorization request"
		);
		AuditEvent::builder(AuditEventType::LoginFailed)
			.detail(json!({"stage": "authorize", "provider_error": error}))
			.build()
			.emit();
		return bad_request(
			"authorization_failed",
			"The identity provider rejected the authorization request",
		);
	}

	let (Some(code), Some(flow_state)) = (params.code, params.state) else {
		return bad_request("invalid_callback", "Missing code or state parameter");
	};

	let record = match state.pkce.complete(&flow_state).await {
		Ok(Some(record)) => record,
		Ok(None) => {
			// Unknown, replayed, and expired all look the same on purpose.
			AuditEvent::builder(AuditEventType::LoginFailed)
				.detail(json!({"stage": "state"}))
				.build()
				.emit();
			return bad_request("invalid_state", "Login attempt is invalid or expired");
		}
		Err(err) => {
			tracing::error!(error = %err, "failed to redeem login state");
			return internal_error();
		}
	};

	let tokens = match oidc.exchange_code(&code, &record.code_verifier).await {
		Ok(tokens) => tokens,
		Err(err) => {
			tracing::warn!(error = %err, "authorization code exchange failed");
			AuditEvent::builder(AuditEventType::LoginFailed)
				.detail(json!({"stage": "exchange"}))
				.build()
				.emit();
			return bad_gateway("token_exchange_failed", "Token exchange with the identity provider failed");
		}
	};

	let handoff = match state
		.handoff
		.issue(
			HandoffTokens {
				access_token: tokens.access_token,
				refresh_token: tokens.refresh_token,
				token_type: tokens.token_type,
				expires_in: tokens.expires_in,
			},
			Some(record.redirect_uri.clone()),
		)
		.await
	{
		Ok(handoff) => handoff,
		Err(err) => {
			tracing::error!(error = %err, "failed to issue handoff code");
			return internal_error();
		}
	};

	AuditEvent::builder(AuditEventType::HandoffIssued)
		.detail(json!({"redirect": record.redirect_uri}))
		.build()
		.emit();

	Redirect::to(&append_code(&record.redirect_uri, &handoff.code)).into_response()
}

/// POST /auth/session - exchange a handoff code for a session cookie.
pub async fn create_session(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(body): Json<CreateSessionRequest>,
) -> Response {
	let record = match state.handoff.redeem(&body.code).await {
		Ok(Some(record)) => record,
		Ok(None) => {
			tracing::warn!("handoff code rejected");
			return bad_request("invalid_code", "Code is invalid or expired");
		}
		Err(err) => {
			tracing::error!(error = %err, "failed to redeem handoff code");
			return internal_error();
		}
	};

	AuditEvent::builder(AuditEventType::HandoffRedeemed).build().emit();

	let redirect = record.redirect_url.clone();
	let tokens = record.into_tokens();
	let token_set = TokenSet {
		access_token: tokens.access_token,
		refresh_token: tokens.refresh_token,
		// Handoff codes park the minimal token payload; identity comes
		// out of the access token at creation.
		id_token: None,
		token_type: tokens.token_type,
		expires_in: tokens.expires_in,
	};

	let client = capture_client_context(&headers);
	let session = match state.sessions.create(&token_set, Some(&client)).await {
		Ok(session) => session,
		Err(err) => {
			tracing::error!(error = %err, "failed to create session");
			return internal_error();
		}
	};

	AuditEvent::builder(AuditEventType::Login)
		.user(session.user_id.clone())
		.session(session.session_id.clone())
		.build()
		.emit();
	AuditEvent::builder(AuditEventType::SessionCreated)
		.user(session.user_id.clone())
		.session(session.session_id.clone())
		.build()
		.emit();

	let cookie = session_cookie(&state.config.session, &session.session_id);
	(
		StatusCode::OK,
		[(SET_COOKIE, cookie)],
		Json(SessionResponse::from_session(&session, redirect)),
	)
		.into_response()
}

/// POST /auth/refresh - refresh tokens at the provider and rotate the
/// session id.
pub async fn refresh(
	State(state): State<AppState>,
	session: Option<Extension<UserSession>>,
) -> Response {
	let Some(Extension(session)) = session else {
		return unauthorized();
	};
	let Some(oidc) = state.oidc.as_ref() else {
		return provider_not_configured();
	};
	let Some(refresh_token) = session.refresh_token.clone() else {
		return bad_request("no_refresh_token", "Session has no refresh token");
	};

	let tokens = match oidc.refresh(&refresh_token).await {
		Ok(tokens) => tokens,
		Err(err) => {
			tracing::warn!(user = %session.user_id, error = %err, "token refresh failed");
			return bad_gateway("refresh_failed", "Token refresh with the identity provider failed");
		}
	};

	let token_set = TokenSet {
		access_token: tokens.access_token,
		refresh_token: tokens.refresh_token,
		id_token: tokens.id_token,
		token_type: tokens.token_type,
		expires_in: tokens.expires_in,
	};

	match state.sessions.update_tokens(&session.session_id, &token_set).await {
		Ok(Some(_)) => {}
		Ok(None) => return unauthorized(),
		Err(err) => {
			tracing::error!(error = %err, "failed to store refreshed tokens");
			return internal_error();
		}
	}

	// New id after the privilege-relevant change; the old cookie dies.
	let rotated = match state.sessions.rotate(&session.session_id).await {
		Ok(Some(rotated)) => rotated,
		Ok(None) => return unauthorized(),
		Err(err) => {
			tracing::error!(error = %err, "failed to rotate session");
			return internal_error();
		}
	};

	AuditEvent::builder(AuditEventType::SessionRotated)
		.user(rotated.user_id.clone())
		.session(rotated.session_id.clone())
		.build()
		.emit();

	let cookie = session_cookie(&state.config.session, &rotated.session_id);
	(
		StatusCode::OK,
		[(SET_COOKIE, cookie)],
		Json(SessionResponse::from_session(&rotated, None)),
	)
		.into_response()
}

/// POST /auth/logout - revoke what we can, drop the session, clear the
/// cookie. Idempotent: logging out without a session still succeeds.
pub async fn logout(
	State(state): State<AppState>,
	session: Option<Extension<UserSession>>,
) -> Response {
	let cleared = clear_session_cookie(&state.config.session);

	let Some(Extension(session)) = session else {
		return (
			StatusCode::OK,
			[(SET_COOKIE, cleared)],
			Json(json!({"status": "logged_out"})),
		)
			.into_response();
	};

	// Best effort; provider revocation failing must not keep the user
	// logged in locally.
	if let (Some(oidc), Some(refresh_token)) = (state.oidc.as_ref(), session.refresh_token.as_ref())
	{
		oidc.revoke(refresh_token, "refresh_token").await;
	}

	match state.sessions.invalidate(&session.session_id).await {
		Ok(_) => {}
		Err(err) => {
			tracing::error!(error = %err, "failed to delete session during logout");
		}
	}

	AuditEvent::builder(AuditEventType::Logout)
		.user(session.user_id.clone())
		.session(session.session_id.clone())
		.build()
		.emit();
	AuditEvent::builder(AuditEventType::SessionRevoked)
		.user(session.user_id.clone())
		.session(session.session_id.clone())
		.build()
		.emit();

	(
		StatusCode::OK,
		[(SET_COOKIE, cleared)],
		Json(json!({"status": "logged_out"})),
	)
		.into_response()
}

/// Validates a requested post-login destination against the allow-list.
///
/// The list holds prefixes; a destination matching none of them falls back
/// to the first entry. Protocol-relative destinations (`//host`) are
/// rejected outright since browsers resolve them off-origin.
fn sanitize_redirect(requested: Option<&str>, allowed: &[String]) -> String {
	let fallback = || {
		allowed
			.first()
			.cloned()
			.unwrap_or_else(|| "/".to_string())
	};

	let Some(requested) = requested else {
		return fallback();
	};
	if requested.starts_with("//") {
		tracing::warn!(requested = %requested, "rejecting protocol-relative redirect");
		return fallback();
	}
	if allowed.iter().any(|prefix| requested.starts_with(prefix.as_str())) {
		requested.to_string()
	} else {
		tracing::warn!(requested = %requested, "redirect not in allow-list, using fallback");
		fallback()
	}
}

/// Appends `?code=...` to a destination that may be a relative path.
fn append_code(redirect: &str, code: &str) -> String {
	match Url::parse(redirect) {
		Ok(mut url) => {
			url.query_pairs_mut().append_pair("code", code);
			url.to_string()
		}
		// Relative path; codes are URL-safe by construction.
		Err(_) => {
			let separator = if redirect.contains('?') { '&' } else { '?' };
			format!("{redirect}{separator}code={code}")
		}
	}
}

fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
	let mut cookie = format!(
		"{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
		config.cookie_name,
		session_id,
		config.ttl_minutes * 60
	);
	if config.cookie_secure {
		cookie.push_str("; Secure");
	}
	cookie
}

fn clear_session_cookie(config: &SessionConfig) -> String {
	let mut cookie = format!(
		"{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
		config.cookie_name
	);
	if config.cookie_secure {
		cookie.push_str("; Secure");
	}
	cookie
}
