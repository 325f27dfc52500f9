// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-time handoff codes for delivering tokens to the browser.
//!
//! After the authorization-code exchange the callback handler must get
//! the result to the frontend without putting raw tokens in a redirect
//! URL, where they would land in browser history, referrer headers, and
//! access logs. Instead the token payload is parked server-side under an
//! opaque `tx_` code:
//!
//! ```text
//!   callback ──issue──▶ store["handoff:tx_..."] ── 302 ?code=tx_... ─▶ browser
//!   browser ──POST code──▶ redeem (atomic take) ──▶ session cookie
//! ```
//!
//! Codes are strictly single-use with a short fixed TTL. [`redeem`]
//! reports unknown, replayed, and expired codes identically as `None`;
//! callers must not let the three cases become distinguishable outside.
//!
//! [`redeem`]: TokenHandoff::redeem

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use warden_common_secret::SecretString;
use warden_store::{KeyValueStore, KeyValueStoreExt, StoreError};

/// Prefix identifying handoff codes, mirrored by the `sid_` session id
/// convention.
pub const HANDOFF_CODE_PREFIX: &str = "tx_";

/// Entropy of generated handoff codes, in bytes.
pub const HANDOFF_CODE_BYTES: usize = 32;

/// Default code lifetime. Long enough for one redirect round trip, short
/// enough that an unredeemed code is worthless almost immediately.
pub const DEFAULT_HANDOFF_TTL_SECS: i64 = 120;

const HANDOFF_KEY_PREFIX: &str = "handoff:";

/// Errors from the handoff flow.
///
/// Unknown, replayed, and expired codes are not errors; `redeem` reports
/// those as `Ok(None)`.
#[derive(Debug, Error)]
pub enum HandoffError {
	#[error("store operation failed: {0}")]
	Store(#[from] StoreError),
}

/// The token material parked behind a handoff code.
#[derive(Debug, Clone)]
pub struct HandoffTokens {
	pub access_token: SecretString,
	pub refresh_token: Option<SecretString>,
	pub token_type: String,
	/// Access token lifetime in seconds, as reported by the provider.
	pub expires_in: Option<i64>,
}

/// One parked token payload, keyed by its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffCode {
	/// Opaque `tx_`-prefixed code; the only thing the browser ever sees.
	pub code: String,

	pub access_token: SecretString,
	pub refresh_token: Option<SecretString>,
	pub token_type: String,
	pub expires_in: Option<i64>,

	/// Post-login destination the frontend should navigate to, when the
	/// login flow captured one.
	pub redirect_url: Option<String>,

	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl HandoffCode {
	pub fn is_expired(&self) -> bool {
		Utc::now() >= self.expires_at
	}

	/// Consumes the record into the token payload it carried.
	pub fn into_tokens(self) -> HandoffTokens {
		HandoffTokens {
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type,
			expires_in: self.expires_in,
		}
	}
}

/// Generates a fresh `tx_`-prefixed code with [`HANDOFF_CODE_BYTES`]
/// bytes of entropy.
pub fn generate_handoff_code() -> String {
	let mut bytes = [0u8; HANDOFF_CODE_BYTES];
	rand::thread_rng().fill(&mut bytes);
	format!("{HANDOFF_CODE_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

/// Issues and redeems single-use handoff codes over a TTL key-value
/// store.
#[derive(Debug)]
pub struct TokenHandoff<S> {
	store: Arc<S>,
	code_ttl: Duration,
}

impl<S: KeyValueStore> TokenHandoff<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self::with_ttl(store, Duration::seconds(DEFAULT_HANDOFF_TTL_SECS))
	}

	pub fn with_ttl(store: Arc<S>, code_ttl: Duration) -> Self {
		Self { store, code_ttl }
	}

	/// Parks a token payload and returns the record carrying its code.
	pub async fn issue(
		&self,
		tokens: HandoffTokens,
		redirect_url: Option<String>,
	) -> Result<HandoffCode, HandoffError> {
		let now = Utc::now();
		let record = HandoffCode {
			code: generate_handoff_code(),
			access_token: tokens.access_token,
			refresh_token: tokens.refresh_token,
			token_type: tokens.token_type,
			expires_in: tokens.expires_in,
			redirect_url,
			created_at: now,
			expires_at: now + self.code_ttl,
		};

		self
			.store
			.put_json(&handoff_key(&record.code), &record, self.code_ttl)
			.await?;
		info!("issued token handoff code");
		Ok(record)
	}

	/// Redeems a code, atomically removing it.
	///
	/// `Ok(None)` covers every non-success uniformly: unknown code,
	/// already-redeemed code, and expired record.
	pub async fn redeem(&self, code: &str) -> Result<Option<HandoffCode>, HandoffError> {
		let Some(record) = self
			.store
			.take_json::<HandoffCode>(&handoff_key(code))
			.await?
		else {
			debug!("handoff code unknown or already redeemed");
			return Ok(None);
		};

		if record.is_expired() {
			// The take above already removed it; nothing to clean up.
			warn!("handoff code expired before redemption");
			return Ok(None);
		}

		debug!("redeemed token handoff code");
		Ok(Some(record))
	}
}

fn handoff_key(code: &str) -> String {
	format!("{HANDOFF_KEY_PREFIX}{code}")
}
