// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Administrator-maintained policy limits section.
//!
//! [`warden_policy::PolicyConfig`] is already the sparse, mergeable
//! record shape a layer needs, so this section holds it directly instead
//! of mirroring it. In TOML:
//!
//! ```toml
//! [policy.defaults]
//! max_price = 5000000
//!
//! [policy.roles.manager]
//! max_price = 8000000
//! allowed_categories = ["painting", "sculpture"]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_policy::PolicyConfig;

/// Code-defined baseline every user falls back to when neither an
/// administrator section nor an identity-provider claim overrides it.
pub fn baseline_defaults() -> PolicyConfig {
	PolicyConfig {
		max_price: Some(5_000_000),
		min_price: Some(0),
		..PolicyConfig::default()
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfigLayer {
	pub defaults: Option<PolicyConfig>,
	pub roles: Option<BTreeMap<String, PolicyConfig>>,
}

impl PolicyConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.defaults.is_some() {
			self.defaults = other.defaults;
		}
		if other.roles.is_some() {
			self.roles = other.roles;
		}
	}

	pub fn finalize(self) -> PolicySettings {
		PolicySettings {
			defaults: self.defaults.unwrap_or_else(baseline_defaults),
			roles: self.roles.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicySettings {
	pub defaults: PolicyConfig,
	/// Per-role overrides, keyed by role name. Role lookup downstream is
	/// case-insensitive.
	pub roles: BTreeMap<String, PolicyConfig>,
}

impl Default for PolicySettings {
	fn default() -> Self {
		PolicyConfigLayer::default().finalize()
	}
}
