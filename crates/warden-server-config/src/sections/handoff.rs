// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token handoff code configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_TTL_SECONDS: i64 = 120;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HandoffConfigLayer {
	pub ttl_seconds: Option<i64>,
}

impl HandoffConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.ttl_seconds.is_some() {
			self.ttl_seconds = other.ttl_seconds;
		}
	}

	pub fn finalize(self) -> HandoffConfig {
		HandoffConfig {
			ttl_seconds: self.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandoffConfig {
	/// Lifetime of a post-login handoff code; one redirect round trip.
	pub ttl_seconds: i64,
}

impl Default for HandoffConfig {
	fn default() -> Self {
		HandoffConfigLayer::default().finalize()
	}
}
