// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session cookie and lifetime configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_TTL_MINUTES: i64 = 480;
const DEFAULT_COOKIE_NAME: &str = "warden_sid";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionConfigLayer {
	pub ttl_minutes: Option<i64>,
	pub cookie_name: Option<String>,
	pub cookie_secure: Option<bool>,
}

impl SessionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.ttl_minutes.is_some() {
			self.ttl_minutes = other.ttl_minutes;
		}
		if other.cookie_name.is_some() {
			self.cookie_name = other.cookie_name;
		}
		if other.cookie_secure.is_some() {
			self.cookie_secure = other.cookie_secure;
		}
	}

	pub fn finalize(self) -> SessionConfig {
		SessionConfig {
			ttl_minutes: self.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
			cookie_name: self
				.cookie_name
				.unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
			cookie_secure: self.cookie_secure.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
	/// Absolute session lifetime; re-armed on every read.
	pub ttl_minutes: i64,
	pub cookie_name: String,
	/// Whether the session cookie carries the `Secure` attribute. Only
	/// disable for plain-HTTP local development.
	pub cookie_secure: bool,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfigLayer::default().finalize()
	}
}
