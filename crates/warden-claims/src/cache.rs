// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read cache for extracted assertion contexts.
//!
//! The BFF sees the same bearer assertion on every request of a session, so
//! extraction results are cached keyed by the JWT signature segment (the
//! only part guaranteed to change when any other part changes). Entries
//! live until the token's own expiry, capped at a fixed ceiling so a
//! long-lived token cannot pin a stale context for hours.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::context::UserClaimsContext;
use crate::extract::{
	decode_payload, extract, extract_from_payload, payload_expiry, signature_segment, ClaimsError,
};

/// Upper bound on how long an extracted context is served from cache,
/// regardless of how far out the token's own expiry lies.
pub const CACHE_TTL_CEILING_SECS: i64 = 300;

/// Default bound on the number of cached assertions.
pub const CACHE_MAX_ENTRIES: usize = 1024;

#[derive(Debug, Clone)]
struct CachedAssertion {
	context: UserClaimsContext,
	expires_at: DateTime<Utc>,
}

impl CachedAssertion {
	fn is_expired(&self) -> bool {
		Utc::now() >= self.expires_at
	}
}

/// Amortizes repeated claim extraction for hot bearer assertions.
#[derive(Debug)]
pub struct AssertionCache {
	entries: RwLock<HashMap<String, CachedAssertion>>,
	ttl_ceiling: Duration,
	max_entries: usize,
}

impl Default for AssertionCache {
	fn default() -> Self {
		Self::new()
	}
}

impl AssertionCache {
	pub fn new() -> Self {
		Self::with_limits(Duration::seconds(CACHE_TTL_CEILING_SECS), CACHE_MAX_ENTRIES)
	}

	pub fn with_limits(ttl_ceiling: Duration, max_entries: usize) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			ttl_ceiling,
			max_entries,
		}
	}

	/// Returns the cached context for `assertion`, extracting and caching
	/// on miss.
	///
	/// Structural extraction failures propagate; nothing is cached for
	/// failing input.
	pub async fn get_or_extract(&self, assertion: &str) -> Result<UserClaimsContext, ClaimsError> {
		let Some(key) = signature_segment(assertion) else {
			// Unkeyable input; extraction supplies the uniform error.
			return extract(assertion);
		};

		{
			let entries = self.entries.read().await;
			if let Some(cached) = entries.get(key) {
				if !cached.is_expired() {
					return Ok(cached.context.clone());
				}
			}
		}

		let payload = decode_payload(assertion)?;
		let context = extract_from_payload(&payload);

		let ceiling = Utc::now() + self.ttl_ceiling;
		let expires_at = match payload_expiry(&payload) {
			Some(token_expiry) => token_expiry.min(ceiling),
			None => ceiling,
		};

		if expires_at > Utc::now() {
			let mut entries = self.entries.write().await;
			if entries.len() >= self.max_entries {
				entries.retain(|_, cached| !cached.is_expired());
			}
			if entries.len() < self.max_entries {
				entries.insert(
					key.to_string(),
					CachedAssertion {
						context: context.clone(),
						expires_at,
					},
				);
			} else {
				debug!(capacity = self.max_entries, "assertion cache full, skipping insert");
			}
		}

		Ok(context)
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}
