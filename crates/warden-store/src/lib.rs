// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! TTL key-value storage behind the security core.
//!
//! Every short-lived security record in the system (PKCE state, sessions,
//! one-time handoff codes) lives in a store implementing [`KeyValueStore`].
//! The trait is deliberately small: string values in, string values out,
//! with an absolute TTL attached at write time. Durable backends plug in
//! behind the same trait; [`MemoryStore`] ships for development, tests, and
//! single-node deployments.
//!
//! # One-time semantics
//!
//! [`KeyValueStore::take`] is the load-bearing operation: an atomic
//! fetch-and-delete. Every "this value may be used exactly once" contract
//! in the system (PKCE state records, handoff codes, session rotation) is
//! built on `take` rather than a get-then-delete sequence, so two racing
//! redeemers can never both win.
//!
//! # Expiry
//!
//! Expired entries are equivalent to absent entries everywhere: `get`,
//! `exists`, and `take` report them as `None`/`false`, and `delete` of an
//! expired entry reports `false`. Implementations may drop expired data
//! lazily.

mod error;
mod memory;

use async_trait::async_trait;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;

/// Asynchronous key-value store with per-entry TTL.
///
/// Implementations must be safe to share across tasks. All methods treat
/// expired entries as absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
	/// Returns the live value for `key`, if any.
	async fn get(&self, key: &str) -> Result<Option<String>>;

	/// Stores `value` under `key`, expiring `ttl` from now. Overwrites any
	/// existing entry, including its expiry.
	async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

	/// Removes `key`. Returns `true` when a live entry was removed.
	async fn delete(&self, key: &str) -> Result<bool>;

	/// Reports whether a live entry exists for `key`.
	async fn exists(&self, key: &str) -> Result<bool>;

	/// Atomically removes and returns the live value for `key`.
	///
	/// This is the one-time-use primitive: when several callers race on the
	/// same key, exactly one receives `Some` and the rest receive `None`.
	/// Implementations must not decompose this into a read followed by a
	/// delete.
	async fn take(&self, key: &str) -> Result<Option<String>>;
}

/// JSON convenience layer over [`KeyValueStore`].
///
/// Blanket-implemented for every store, including trait objects.
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
	/// Reads and deserializes the live value for `key`.
	async fn get_json<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned + Send,
	{
		match self.get(key).await? {
			Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
			None => Ok(None),
		}
	}

	/// Serializes and stores `value` under `key` with the given TTL.
	async fn put_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
	where
		T: Serialize + Sync,
	{
		let raw = serde_json::to_string(value)?;
		self.put(key, raw, ttl).await
	}

	/// Atomically removes and deserializes the live value for `key`.
	async fn take_json<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned + Send,
	{
		match self.take(key).await? {
			Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
			None => Ok(None),
		}
	}
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
