// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated profile endpoint.

use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_claims::UserClaimsContext;
use warden_policy::PolicyFilterContext;
use warden_session::UserSession;

#[derive(Debug, Serialize)]
pub struct MeResponse {
	pub user_id: String,
	pub username: Option<String>,
	pub email: Option<String>,
	pub roles: Vec<String>,
	pub permissions: Vec<String>,
	pub session: Option<MeSession>,
	/// Result-narrowing constraint attached by the authorization gate.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filter: Option<PolicyFilterContext>,
}

#[derive(Debug, Serialize)]
pub struct MeSession {
	pub created_at: DateTime<Utc>,
	pub last_accessed_at: DateTime<Utc>,
	pub token_expires_at: Option<DateTime<Utc>>,
}

/// GET /api/me - who the caller is, as the policy layer sees them.
///
/// The gate in front of this route denies anonymous callers, so the claims
/// extension is present on every request that reaches the handler; the
/// extractors stay optional so the handler never panics if it is mounted
/// bare.
pub async fn me(
	claims: Option<Extension<UserClaimsContext>>,
	session: Option<Extension<UserSession>>,
	filter: Option<Extension<PolicyFilterContext>>,
) -> impl IntoResponse {
	let claims = claims
		.map(|Extension(claims)| claims)
		.unwrap_or_else(UserClaimsContext::anonymous);
	let session = session.map(|Extension(session)| session);

	Json(MeResponse {
		user_id: claims.user_id.clone(),
		username: session.as_ref().and_then(|s| s.username.clone()),
		email: session.as_ref().and_then(|s| s.email.clone()),
		roles: claims.roles.iter().cloned().collect(),
		permissions: claims.permissions.iter().cloned().collect(),
		session: session.as_ref().map(|s| MeSession {
			created_at: s.created_at,
			last_accessed_at: s.last_accessed_at,
			token_expires_at: s.token_expires_at,
		}),
		filter: filter.map(|Extension(filter)| filter),
	})
}
