// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory store implementation.
//!
//! Backs development, tests, and single-node deployments. Entries carry an
//! absolute expiry timestamp; expired entries are indistinguishable from
//! absent ones and are dropped lazily on access or via
//! [`MemoryStore::purge_expired`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::Result;
use crate::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
	value: String,
	expires_at: DateTime<Utc>,
}

impl Entry {
	fn is_expired(&self) -> bool {
		Utc::now() >= self.expires_at
	}
}

/// Thread-safe in-memory key-value store with per-entry TTL.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Removes every expired entry and returns how many were dropped.
	///
	/// Expiry is otherwise enforced lazily, so long-lived processes should
	/// call this periodically to keep the map from accumulating dead keys.
	pub async fn purge_expired(&self) -> usize {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired());
		let purged = before - entries.len();
		if purged > 0 {
			trace!(purged, remaining = entries.len(), "purged expired store entries");
		}
		purged
	}

	/// Number of entries currently held, including not-yet-purged expired ones.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}

#[async_trait]
impl KeyValueStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<String>> {
		{
			let entries = self.entries.read().await;
			match entries.get(key) {
				None => return Ok(None),
				Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
				Some(_) => {}
			}
		}
		// Entry was present but expired: drop it under the write lock,
		// re-checking because a concurrent put may have replaced it.
		let mut entries = self.entries.write().await;
		if entries.get(key).is_some_and(Entry::is_expired) {
			entries.remove(key);
		}
		Ok(None)
	}

	async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		let entry = Entry {
			value,
			expires_at: Utc::now() + ttl,
		};
		self.entries.write().await.insert(key.to_string(), entry);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<bool> {
		let removed = self.entries.write().await.remove(key);
		Ok(removed.is_some_and(|entry| !entry.is_expired()))
	}

	async fn exists(&self, key: &str) -> Result<bool> {
		let entries = self.entries.read().await;
		Ok(entries.get(key).is_some_and(|entry| !entry.is_expired()))
	}

	async fn take(&self, key: &str) -> Result<Option<String>> {
		// Remove-then-inspect under a single write lock: of N concurrent
		// takers exactly one observes the live entry.
		let removed = self.entries.write().await.remove(key);
		match removed {
			Some(entry) if !entry.is_expired() => Ok(Some(entry.value)),
			_ => Ok(None),
		}
	}
}
