// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PKCE (RFC 7636) flow state for the authorization-code flow.
//!
//! The BFF, not the browser, holds the code verifier. Each login attempt
//! creates a [`PkceRecord`] keyed by its `state` value; the record rides
//! out the provider round-trip in the store and is redeemed exactly once
//! when the callback returns.
//!
//! ```text
//!   browser                BFF                         provider
//!      |   GET /auth/login  |                              |
//!      |------------------->|  begin(): verifier,          |
//!      |                    |  challenge, state ---> store |
//!      |   302 authorize?code_challenge=...&state=...      |
//!      |<-------------------|                              |
//!      |-------------------- authenticate ---------------->|
//!      |   302 callback?code=...&state=...                 |
//!      |------------------->|  complete(state): take()     |
//!      |                    |  -> verifier for exchange    |
//! ```
//!
//! `complete` is an atomic take: a state value yields its record at most
//! once, ever. Replayed or forged callbacks see `None` and get the same
//! generic failure as an expired flow.
//!
//! Only the `S256` challenge method is supported; the `plain` method is
//! deliberately not implemented.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use warden_common_secret::SecretString;
use warden_store::{KeyValueStore, KeyValueStoreExt, StoreError};

/// Length of generated code verifiers.
pub const CODE_VERIFIER_LEN: usize = 64;

/// Verifier length bounds accepted by [`is_valid_verifier`] (RFC 7636 §4.1).
pub const CODE_VERIFIER_MIN_LEN: usize = 43;
pub const CODE_VERIFIER_MAX_LEN: usize = 128;

/// Entropy of generated state values, in bytes.
pub const STATE_BYTES: usize = 32;

/// Default lifetime of a pending flow record.
pub const DEFAULT_FLOW_TTL_MINUTES: i64 = 10;

/// The only supported challenge method.
pub const CHALLENGE_METHOD: &str = "S256";

/// The unreserved characters permitted in a code verifier (RFC 7636 §4.1).
const VERIFIER_CHARSET: &[u8] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

const STATE_KEY_PREFIX: &str = "pkce:";

/// Errors from PKCE flow management.
///
/// An unknown, replayed, or expired state is not an error; `complete`
/// reports those as `Ok(None)`.
#[derive(Debug, Error)]
pub enum PkceError {
	#[error("store operation failed: {0}")]
	Store(#[from] StoreError),

	#[error("authorize endpoint is not a valid URL: {0}")]
	InvalidAuthorizeEndpoint(#[from] url::ParseError),
}

/// One pending authorization-code flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceRecord {
	/// The secret proof sent to the token endpoint on exchange. Never
	/// leaves the server.
	pub code_verifier: SecretString,

	/// base64url(SHA-256(verifier)), sent to the provider up front.
	pub code_challenge: String,

	/// Always [`CHALLENGE_METHOD`].
	pub challenge_method: String,

	/// CSRF binding value and storage key.
	pub state: String,

	/// Where to send the browser once the flow completes. This is the
	/// application destination, not the OAuth callback endpoint.
	pub redirect_uri: String,

	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl PkceRecord {
	pub fn is_expired(&self) -> bool {
		Utc::now() >= self.expires_at
	}
}

/// Generates a fresh code verifier: [`CODE_VERIFIER_LEN`] characters drawn
/// from the RFC 7636 unreserved set.
pub fn generate_code_verifier() -> SecretString {
	let mut rng = rand::thread_rng();
	let verifier: String = (0..CODE_VERIFIER_LEN)
		.map(|_| {
			let idx = rng.gen_range(0..VERIFIER_CHARSET.len());
			VERIFIER_CHARSET[idx] as char
		})
		.collect();
	SecretString::new(verifier)
}

/// Derives the S256 code challenge for a verifier.
pub fn compute_code_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Generates a state value: base64url of [`STATE_BYTES`] random bytes.
pub fn generate_state() -> String {
	let mut bytes = [0u8; STATE_BYTES];
	rand::thread_rng().fill(&mut bytes);
	URL_SAFE_NO_PAD.encode(bytes)
}

/// Checks a verifier against the RFC 7636 length and charset rules.
///
/// Generated verifiers always pass; this exists for validating verifiers
/// supplied by callers that bring their own.
pub fn is_valid_verifier(verifier: &str) -> bool {
	(CODE_VERIFIER_MIN_LEN..=CODE_VERIFIER_MAX_LEN).contains(&verifier.len())
		&& verifier.bytes().all(|byte| VERIFIER_CHARSET.contains(&byte))
}

/// Builds the provider authorization URL for a pending flow.
///
/// `callback_uri` is the OAuth redirect_uri (the BFF's own callback
/// endpoint); the record's `redirect_uri` plays no part here.
pub fn authorization_url(
	authorize_endpoint: &str,
	client_id: &str,
	callback_uri: &str,
	scope: &str,
	record: &PkceRecord,
) -> Result<Url, PkceError> {
	let mut url = Url::parse(authorize_endpoint)?;
	url.query_pairs_mut()
		.append_pair("response_type", "code")
		.append_pair("client_id", client_id)
		.append_pair("redirect_uri", callback_uri)
		.append_pair("scope", scope)
		.append_pair("state", &record.state)
		.append_pair("code_challenge", &record.code_challenge)
		.append_pair("code_challenge_method", &record.challenge_method);
	Ok(url)
}

/// Creates and redeems pending flow records against a store.
#[derive(Debug)]
pub struct PkceFlowManager<S> {
	store: Arc<S>,
	flow_ttl: Duration,
}

impl<S: KeyValueStore> PkceFlowManager<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self::with_ttl(store, Duration::minutes(DEFAULT_FLOW_TTL_MINUTES))
	}

	pub fn with_ttl(store: Arc<S>, flow_ttl: Duration) -> Self {
		Self { store, flow_ttl }
	}

	/// Starts a flow: generates verifier, challenge, and state, and
	/// persists the record under the state for the configured TTL.
	pub async fn begin(&self, redirect_uri: &str) -> Result<PkceRecord, PkceError> {
		let code_verifier = generate_code_verifier();
		let code_challenge = compute_code_challenge(code_verifier.expose());
		let state = generate_state();
		let now = Utc::now();

		let record = PkceRecord {
			code_verifier,
			code_challenge,
			challenge_method: CHALLENGE_METHOD.to_string(),
			state,
			redirect_uri: redirect_uri.to_string(),
			created_at: now,
			expires_at: now + self.flow_ttl,
		};

		self
			.store
			.put_json(&state_key(&record.state), &record, self.flow_ttl)
			.await?;
		debug!(state = %record.state, "began pkce flow");
		Ok(record)
	}

	/// Redeems the flow for `state`, atomically consuming it.
	///
	/// `Ok(None)` covers every non-success uniformly: unknown state,
	/// already-redeemed state, and expired record. Callers must not
	/// distinguish these to the outside.
	pub async fn complete(&self, state: &str) -> Result<Option<PkceRecord>, PkceError> {
		let Some(record) = self
			.store
			.take_json::<PkceRecord>(&state_key(state))
			.await?
		else {
			debug!("pkce state unknown or already redeemed");
			return Ok(None);
		};

		if record.is_expired() {
			// The take above already removed it; nothing to clean up.
			warn!(state = %record.state, "pkce record expired before completion");
			return Ok(None);
		}

		debug!(state = %record.state, "completed pkce flow");
		Ok(Some(record))
	}
}

fn state_key(state: &str) -> String {
	format!("{STATE_KEY_PREFIX}{state}")
}
