// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session resolution middleware.
//!
//! Runs ahead of every route. When the request carries a live session
//! cookie, the middleware loads the session (re-arming its sliding TTL),
//! checks the client fingerprint, derives the caller's claims context from
//! the session's tokens through the assertion cache, and inserts both the
//! [`UserSession`] and the [`UserClaimsContext`] into the request
//! extensions. Requests without a usable session pass through untouched;
//! downstream gates treat them as anonymous.
//!
//! The fingerprint check is a tripwire, not an authenticator: a mismatch
//! is recorded and the request still proceeds.

use axum::{
	body::Body,
	extract::State,
	http::{header::COOKIE, HeaderMap, Request},
	middleware::Next,
	response::Response,
};
use warden_claims::UserClaimsContext;
use warden_session::{ClientContext, UserSession};

use crate::{
	api::AppState,
	audit::{AuditEvent, AuditEventType},
};

/// Extracts the named cookie's value from the Cookie header.
pub fn extract_session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
	headers
		.get(COOKIE)?
		.to_str()
		.ok()?
		.split(';')
		.find_map(|cookie| {
			let cookie = cookie.trim();
			let (name, value) = cookie.split_once('=')?;
			if name == cookie_name && !value.is_empty() {
				Some(value.to_string())
			} else {
				None
			}
		})
}

/// Best-effort client address from proxy headers.
///
/// The BFF sits behind a reverse proxy, so the peer address of the TCP
/// connection is the proxy, not the client. `X-Forwarded-For` carries the
/// original client as its first hop.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
	if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|value| value.to_str().ok()) {
		let first = forwarded.split(',').next()?.trim();
		if !first.is_empty() {
			return Some(first.to_string());
		}
	}
	headers
		.get("x-real-ip")
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
}

/// Captures the request attributes a fingerprint is computed from.
pub fn capture_client_context(headers: &HeaderMap) -> ClientContext {
	ClientContext::from_headers(client_ip(headers), headers)
}

/// Resolves the session cookie into request extensions.
pub async fn attach_session(
	State(state): State<AppState>,
	mut req: Request<Body>,
	next: Next,
) -> Response {
	let Some(session_id) = extract_session_cookie(req.headers(), &state.config.session.cookie_name)
	else {
		return next.run(req).await;
	};

	let session = match state.sessions.get(&session_id).await {
		Ok(Some(session)) => session,
		// Unknown, expired, or unreadable sessions all degrade to
		// anonymous; the gate decides what anonymous may do.
		Ok(None) | Err(_) => return next.run(req).await,
	};

	let client = capture_client_context(req.headers());
	if !state.sessions.validate_client_context(&session, &client) {
		AuditEvent::builder(AuditEventType::SessionCompromised)
			.user(session.user_id.clone())
			.session(session.session_id.clone())
			.build()
			.emit();
	}

	let claims = claims_for(&state, &session).await;

	req.extensions_mut().insert(claims);
	req.extensions_mut().insert(session);
	next.run(req).await
}

/// Claims context from the session's tokens, ID token first.
///
/// Mirrors the identity chain used at session creation: a session whose
/// tokens no longer decode degrades to the anonymous subject instead of
/// failing the request.
async fn claims_for(state: &AppState, session: &UserSession) -> UserClaimsContext {
	if let Some(id_token) = session.id_token.as_ref() {
		if let Ok(claims) = state.assertions.get_or_extract(id_token.expose()).await {
			return claims;
		}
	}
	match state.assertions.get_or_extract(session.access_token.expose()).await {
		Ok(claims) => claims,
		Err(err) => {
			tracing::debug!(
				user = %session.user_id,
				error = %err,
				"session tokens do not decode, treating subject as anonymous"
			);
			UserClaimsContext::anonymous()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::header::HeaderValue;

	mod cookie_extraction {
		use super::*;

		fn headers_with(cookie: &str) -> HeaderMap {
			let mut headers = HeaderMap::new();
			headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
			headers
		}

		#[test]
		fn finds_named_cookie() {
			let headers = headers_with("warden_sid=sid_abc123");
			assert_eq!(
				extract_session_cookie(&headers, "warden_sid").as_deref(),
				Some("sid_abc123")
			);
		}

		#[test]
		fn finds_cookie_among_several() {
			let headers = headers_with("theme=dark; warden_sid=sid_abc123; locale=en");
			assert_eq!(
				extract_session_cookie(&headers, "warden_sid").as_deref(),
				Some("sid_abc123")
			);
		}

		#[test]
		fn missing_cookie_is_none() {
			let headers = headers_with("theme=dark");
			assert_eq!(extract_session_cookie(&headers, "warden_sid"), None);
		}

		#[test]
		fn empty_value_is_none() {
			let headers = headers_with("warden_sid=");
			assert_eq!(extract_session_cookie(&headers, "warden_sid"), None);
		}

		#[test]
		fn no_header_is_none() {
			let headers = HeaderMap::new();
			assert_eq!(extract_session_cookie(&headers, "warden_sid"), None);
		}
	}

	mod client_address {
		use super::*;

		#[test]
		fn takes_first_forwarded_hop() {
			let mut headers = HeaderMap::new();
			headers.insert(
				"x-forwarded-for",
				HeaderValue::from_static("203.0.113.9, 10.0.0.2"),
			);
			assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
		}

		#[test]
		fn falls_back_to_real_ip() {
			let mut headers = HeaderMap::new();
			headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
			assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));
		}

		#[test]
		fn absent_headers_yield_none() {
			assert_eq!(client_ip(&HeaderMap::new()), None);
		}
	}
}
