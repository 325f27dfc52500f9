// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side sessions for the BFF.
//!
//! Browsers hold an opaque `sid_` cookie; the tokens and identity live in
//! a [`UserSession`] record in the store. The manager owns the full record
//! lifecycle:
//!
//! - **create**: extract identity from the token set, bind an optional
//!   client fingerprint, persist with an absolute TTL
//! - **get**: sliding expiry via rewrite; every hit re-arms the TTL
//! - **rotate**: new id, same record, old id dead; for privilege changes
//!   and token refresh
//! - **invalidate**: unconditional delete
//!
//! Identity comes out of the ID token when present, the access token
//! otherwise; tokens that decode as JWTs populate user id, roles, and the
//! deduplicated claim map, and opaque tokens degrade to an anonymous
//! record rather than failing session creation.

mod fingerprint;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use warden_claims::UserClaimsContext;
use warden_common_secret::SecretString;
use warden_store::{KeyValueStore, KeyValueStoreExt, StoreError};

pub use fingerprint::ClientContext;

/// Prefix identifying session ids. Follows the token prefix convention
/// used across the system (`tx_` for handoff codes).
pub const SESSION_ID_PREFIX: &str = "sid_";

/// Entropy of generated session ids, in bytes.
pub const SESSION_ID_BYTES: usize = 32;

/// Default absolute session lifetime, re-armed on every read.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 480;

const SESSION_KEY_PREFIX: &str = "session:";

/// Errors from session management.
///
/// Only critical-path store failures surface here; lookups of unknown or
/// expired sessions are `Ok(None)`.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("store operation failed: {0}")]
	Store(#[from] StoreError),
}

/// The token material a session is created from.
///
/// Deliberately local to this crate (the identity-provider client has its
/// own wire-shaped response type) so the session layer stays independent
/// of any particular provider client.
#[derive(Debug, Clone)]
pub struct TokenSet {
	pub access_token: SecretString,
	pub refresh_token: Option<SecretString>,
	pub id_token: Option<SecretString>,
	pub token_type: String,
	/// Access token lifetime in seconds, as reported by the provider.
	pub expires_in: Option<i64>,
}

/// One authenticated session, stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
	/// Opaque identifier handed to the browser; storage key.
	pub session_id: String,

	pub user_id: String,
	pub username: Option<String>,
	pub email: Option<String>,

	/// Roles extracted at creation, lowercase.
	pub roles: BTreeSet<String>,

	/// Scalar claims deduplicated by claim type, first occurrence wins.
	pub claims: BTreeMap<String, String>,

	pub access_token: SecretString,
	pub refresh_token: Option<SecretString>,
	pub id_token: Option<SecretString>,
	pub token_type: String,
	pub token_expires_at: Option<DateTime<Utc>>,

	pub created_at: DateTime<Utc>,
	pub last_accessed_at: DateTime<Utc>,

	/// Client fingerprint captured at creation, when one was available.
	pub fingerprint: Option<String>,
}

/// Generates a fresh `sid_`-prefixed session id with
/// [`SESSION_ID_BYTES`] bytes of entropy.
pub fn generate_session_id() -> String {
	let mut bytes = [0u8; SESSION_ID_BYTES];
	rand::thread_rng().fill(&mut bytes);
	format!("{SESSION_ID_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Session lifecycle over a TTL key-value store.
#[derive(Debug)]
pub struct SessionManager<S> {
	store: Arc<S>,
	session_ttl: Duration,
}

impl<S: KeyValueStore> SessionManager<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self::with_ttl(store, Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
	}

	pub fn with_ttl(store: Arc<S>, session_ttl: Duration) -> Self {
		Self { store, session_ttl }
	}

	/// Creates a session from a token set.
	///
	/// Identity extraction prefers the ID token and falls back to the
	/// access token; a token set where neither decodes still yields a
	/// session, just an anonymous one. The write is on the critical path
	/// and its failure propagates.
	pub async fn create(
		&self,
		tokens: &TokenSet,
		client: Option<&ClientContext>,
	) -> Result<UserSession, SessionError> {
		let identity = extract_identity(tokens);
		let now = Utc::now();

		let session = UserSession {
			session_id: generate_session_id(),
			user_id: identity.user_id,
			username: identity.username,
			email: identity.email,
			roles: identity.roles,
			claims: identity.claims,
			access_token: tokens.access_token.clone(),
			refresh_token: tokens.refresh_token.clone(),
			id_token: tokens.id_token.clone(),
			token_type: tokens.token_type.clone(),
			token_expires_at: tokens.expires_in.map(|secs| now + Duration::seconds(secs)),
			created_at: now,
			last_accessed_at: now,
			fingerprint: client.map(ClientContext::fingerprint),
		};

		self
			.store
			.put_json(&session_key(&session.session_id), &session, self.session_ttl)
			.await?;
		info!(user = %session.user_id, "created session");
		Ok(session)
	}

	/// Fetches a live session and re-arms its TTL.
	///
	/// Store read failures degrade to `Ok(None)`: an unreachable store
	/// must look like "no session" to the request path, never take it
	/// down. A failed TTL rewrite is logged and the session still served;
	/// the record simply keeps its previous expiry.
	pub async fn get(&self, session_id: &str) -> Result<Option<UserSession>, SessionError> {
		let key = session_key(session_id);
		let mut session = match self.store.get_json::<UserSession>(&key).await {
			Ok(Some(session)) => session,
			Ok(None) => return Ok(None),
			Err(err) => {
				warn!(error = %err, "session read failed, treating as absent");
				return Ok(None);
			}
		};

		session.last_accessed_at = Utc::now();
		if let Err(err) = self.store.put_json(&key, &session, self.session_ttl).await {
			warn!(error = %err, "session ttl refresh failed");
		}
		Ok(Some(session))
	}

	/// Re-keys a session under a fresh id, atomically retiring the old one.
	///
	/// Used after privilege-sensitive events and token refresh so a leaked
	/// pre-event id is worthless. `Ok(None)` when the old id was already
	/// gone (expired, invalidated, or lost a concurrent rotation race).
	pub async fn rotate(&self, session_id: &str) -> Result<Option<UserSession>, SessionError> {
		let Some(mut session) = self
			.store
			.take_json::<UserSession>(&session_key(session_id))
			.await?
		else {
			debug!("rotation requested for absent session");
			return Ok(None);
		};

		session.session_id = generate_session_id();
		session.last_accessed_at = Utc::now();
		self
			.store
			.put_json(&session_key(&session.session_id), &session, self.session_ttl)
			.await?;
		info!(user = %session.user_id, "rotated session");
		Ok(Some(session))
	}

	/// Replaces the token material after a refresh.
	///
	/// The provider may omit a new refresh token; the stored one then
	/// survives. Callers are expected to rotate afterwards.
	pub async fn update_tokens(
		&self,
		session_id: &str,
		tokens: &TokenSet,
	) -> Result<Option<UserSession>, SessionError> {
		let key = session_key(session_id);
		let Some(mut session) = self.store.get_json::<UserSession>(&key).await? else {
			return Ok(None);
		};

		let now = Utc::now();
		session.access_token = tokens.access_token.clone();
		if tokens.refresh_token.is_some() {
			session.refresh_token = tokens.refresh_token.clone();
		}
		if tokens.id_token.is_some() {
			session.id_token = tokens.id_token.clone();
		}
		session.token_type = tokens.token_type.clone();
		session.token_expires_at = tokens.expires_in.map(|secs| now + Duration::seconds(secs));
		session.last_accessed_at = now;

		self.store.put_json(&key, &session, self.session_ttl).await?;
		debug!(user = %session.user_id, "updated session tokens");
		Ok(Some(session))
	}

	/// Deletes a session. Returns whether a live session was removed.
	pub async fn invalidate(&self, session_id: &str) -> Result<bool, SessionError> {
		let removed = self.store.delete(&session_key(session_id)).await?;
		if removed {
			info!("session invalidated");
		}
		Ok(removed)
	}

	/// Deletes a session in response to a compromise signal. Identical
	/// mechanics to [`invalidate`](Self::invalidate), logged at warn.
	pub async fn invalidate_compromised(&self, session_id: &str) -> Result<bool, SessionError> {
		let removed = self.store.delete(&session_key(session_id)).await?;
		if removed {
			warn!("session invalidated after compromise signal");
		}
		Ok(removed)
	}

	/// Compares the stored fingerprint against the presenting client.
	///
	/// Fail-open by contract: a session with no stored fingerprint always
	/// validates. A mismatch returns `false` and is logged; acting on it
	/// (or not) is the caller's decision.
	pub fn validate_client_context(&self, session: &UserSession, client: &ClientContext) -> bool {
		let Some(stored) = session.fingerprint.as_deref() else {
			return true;
		};
		let matches = stored == client.fingerprint();
		if !matches {
			warn!(user = %session.user_id, "client fingerprint mismatch");
		}
		matches
	}
}

struct Identity {
	user_id: String,
	username: Option<String>,
	email: Option<String>,
	roles: BTreeSet<String>,
	claims: BTreeMap<String, String>,
}

/// ID token first, access token second, anonymous last.
fn extract_identity(tokens: &TokenSet) -> Identity {
	let assertion_ctx = tokens
		.id_token
		.as_ref()
		.and_then(|token| warden_claims::extract(token.expose()).ok())
		.or_else(|| warden_claims::extract(tokens.access_token.expose()).ok());

	let Some(ctx) = assertion_ctx else {
		warn!("no decodable identity token, creating anonymous session");
		return Identity {
			user_id: UserClaimsContext::anonymous().user_id,
			username: None,
			email: None,
			roles: BTreeSet::new(),
			claims: BTreeMap::new(),
		};
	};

	Identity {
		user_id: ctx.user_id.clone(),
		username: ctx
			.claim("preferred_username")
			.or_else(|| ctx.claim("username"))
			.map(str::to_string),
		email: ctx.claim("email").map(str::to_string),
		roles: ctx.roles,
		claims: ctx.claims,
	}
}

fn session_key(session_id: &str) -> String {
	format!("{SESSION_KEY_PREFIX}{session_id}")
}
