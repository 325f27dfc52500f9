// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-subject policy configuration and its three-layer resolution.
//!
//! Limits that policies consult (price window, category allow-list,
//! approval ceiling) come from three places, lowest to highest precedence:
//!
//! 1. code-defined defaults,
//! 2. administrator-authored per-role configuration,
//! 3. per-user values carried directly in the subject's claims.
//!
//! Resolution is a field-wise fold with the config-layer merge law: the
//! right-hand side wins wherever it is `Some`, the left-hand value survives
//! otherwise. A role that only sets `max_price` therefore inherits every
//! other default, and a single user claim can override just one field of
//! an otherwise role-driven configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_claims::{AttrValue, UserClaimsContext};

/// Claim types recognized as first-class configuration fields, with or
/// without the `policy:` prefix.
const RECOGNIZED_FIELDS: &[&str] = &["max_price", "min_price", "approval_limit", "allowed_categories"];

/// Prefix marking policy-relevant claims that fold into
/// [`PolicyConfig::attributes`] when not recognized as a first-class field.
const POLICY_CLAIM_PREFIX: &str = "policy:";

/// Sparse, mergeable policy limits. Prices are minor currency units.
///
/// `None` means "this layer says nothing", never "unlimited"; whether an
/// absent limit permits everything is the consuming policy's call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
	pub max_price: Option<i64>,
	pub min_price: Option<i64>,
	pub allowed_categories: Option<BTreeSet<String>>,
	pub approval_limit: Option<i64>,
	pub attributes: Option<BTreeMap<String, AttrValue>>,
}

impl PolicyConfig {
	/// Folds `other` into `self`; `other` wins wherever it is `Some`.
	pub fn merge(&mut self, other: Self) {
		if other.max_price.is_some() {
			self.max_price = other.max_price;
		}
		if other.min_price.is_some() {
			self.min_price = other.min_price;
		}
		if other.allowed_categories.is_some() {
			self.allowed_categories = other.allowed_categories;
		}
		if other.approval_limit.is_some() {
			self.approval_limit = other.approval_limit;
		}
		if other.attributes.is_some() {
			self.attributes = other.attributes;
		}
	}

	pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
		self.attributes.as_ref()?.get(name)
	}
}

/// Resolves the effective [`PolicyConfig`] for a subject.
///
/// Built once at startup from server configuration and injected wherever
/// policies need limits; there is no ambient global.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfigResolver {
	defaults: PolicyConfig,
	// Keys are lowercase; role lookup is case-insensitive like every other
	// role comparison in the system.
	role_configs: HashMap<String, PolicyConfig>,
}

impl PolicyConfigResolver {
	pub fn new(defaults: PolicyConfig) -> Self {
		Self {
			defaults,
			role_configs: HashMap::new(),
		}
	}

	pub fn with_role_config(mut self, role: impl AsRef<str>, config: PolicyConfig) -> Self {
		self.role_configs.insert(role.as_ref().to_lowercase(), config);
		self
	}

	pub fn defaults(&self) -> &PolicyConfig {
		&self.defaults
	}

	/// The sparse configuration an administrator attached to `role`.
	/// Unknown roles yield an empty layer, not an error.
	pub fn for_role(&self, role: &str) -> PolicyConfig {
		self
			.role_configs
			.get(&role.to_lowercase())
			.cloned()
			.unwrap_or_default()
	}

	/// The sparse configuration carried in the subject's own claims.
	///
	/// Each recognized field reads the bare claim type first, then the
	/// `policy:`-prefixed variant. Values that fail to parse are logged and
	/// leave the field unset; a bad claim never fails the request. All
	/// remaining `policy:`-prefixed claims fold into `attributes`.
	pub fn for_claims(&self, ctx: &UserClaimsContext) -> PolicyConfig {
		let mut config = PolicyConfig {
			max_price: numeric_claim(ctx, "max_price"),
			min_price: numeric_claim(ctx, "min_price"),
			approval_limit: numeric_claim(ctx, "approval_limit"),
			..PolicyConfig::default()
		};

		if let Some(raw) = claim_variant(ctx, "allowed_categories") {
			let categories: BTreeSet<String> = raw
				.split(',')
				.map(str::trim)
				.filter(|category| !category.is_empty())
				.map(str::to_string)
				.collect();
			if !categories.is_empty() {
				config.allowed_categories = Some(categories);
			}
		}

		let mut attributes = BTreeMap::new();
		for (claim_type, value) in &ctx.claims {
			let Some(name) = claim_type.strip_prefix(POLICY_CLAIM_PREFIX) else {
				continue;
			};
			if RECOGNIZED_FIELDS.contains(&name) {
				continue;
			}
			attributes.insert(name.to_string(), AttrValue::parse(value));
		}
		if !attributes.is_empty() {
			config.attributes = Some(attributes);
		}

		config
	}

	/// defaults, then each held role (deterministic order), then claims.
	pub fn effective(&self, ctx: &UserClaimsContext) -> PolicyConfig {
		let mut config = self.defaults.clone();
		for role in &ctx.roles {
			config.merge(self.for_role(role));
		}
		config.merge(self.for_claims(ctx));
		config
	}
}

fn claim_variant<'a>(ctx: &'a UserClaimsContext, field: &str) -> Option<&'a str> {
	ctx
		.claim(field)
		.or_else(|| ctx.claim(&format!("{POLICY_CLAIM_PREFIX}{field}")))
}

fn numeric_claim(ctx: &UserClaimsContext, field: &'static str) -> Option<i64> {
	let raw = claim_variant(ctx, field)?;
	match raw.trim().parse::<i64>() {
		Ok(value) => Some(value),
		Err(_) => {
			warn!(field, value = %raw, user = %ctx.user_id, "ignoring non-numeric policy claim");
			None
		}
	}
}
