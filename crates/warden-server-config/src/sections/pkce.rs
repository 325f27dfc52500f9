// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PKCE login window configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PkceConfigLayer {
	pub ttl_minutes: Option<i64>,
}

impl PkceConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.ttl_minutes.is_some() {
			self.ttl_minutes = other.ttl_minutes;
		}
	}

	pub fn finalize(self) -> PkceConfig {
		PkceConfig {
			ttl_minutes: self.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PkceConfig {
	/// How long a started login may sit before its callback arrives.
	pub ttl_minutes: i64,
}

impl Default for PkceConfig {
	fn default() -> Self {
		PkceConfigLayer::default().finalize()
	}
}
