// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret wrapper types that keep sensitive values out of logs.
//!
//! [`Secret<T>`] holds a value whose `Debug` and `Display` output is always
//! the literal [`REDACTED`] marker. Reading the inner value requires an
//! explicit [`Secret::expose`] call, which makes every place a secret
//! actually leaves the wrapper visible in a code search.
//!
//! The inner value is zeroized when the wrapper is dropped.
//!
//! # Serde
//!
//! With the default `serde` feature the wrapper serializes and deserializes
//! transparently. Serialization emits the real value: records that carry
//! secrets (session state, token payloads) must round-trip through storage
//! intact. Redaction applies to `Debug` and `Display` only.
//!
//! # Example
//!
//! ```
//! use warden_common_secret::{SecretString, REDACTED};
//!
//! let token = SecretString::new("sid_abc123".to_string());
//! assert_eq!(format!("{token:?}"), REDACTED);
//! assert_eq!(token.expose(), "sid_abc123");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// Marker emitted by `Debug` and `Display` in place of the wrapped value.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must not appear in logs or debug output.
pub struct Secret<T: Zeroize>(T);

/// The common case: a secret backed by a `String`.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	/// Wraps a sensitive value.
	pub fn new(value: T) -> Self {
		Self(value)
	}

	/// Grants access to the wrapped value.
	///
	/// Call sites are intentionally explicit so that auditing where secrets
	/// escape the wrapper is a plain text search for `expose`.
	pub fn expose(&self) -> &T {
		&self.0
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
impl<T: Zeroize + serde::Serialize> serde::Serialize for Secret<T> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		self.0.serialize(serializer)
	}
}

#[cfg(feature = "serde")]
impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		T::deserialize(deserializer).map(Self::new)
	}
}
