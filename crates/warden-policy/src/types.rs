// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Types exchanged between the authorization gate, policies, and handlers.
//!
//! Call-site facts and result filters are closed sum types rather than
//! free-form maps: a policy that needs a fact the variant does not carry is
//! a type error at the call site, not a runtime string-key miss.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Facts about the operation being authorized.
///
/// The subject's identity never lives here; it travels separately as a
/// `UserClaimsContext`. This type only describes the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyContext {
	/// No call-site facts; the subject alone decides.
	None,

	/// An HTTP operation passing through the gate.
	Http {
		method: String,
		path: String,
		#[serde(default)]
		route_params: BTreeMap<String, String>,
	},

	/// A domain entity being acted on.
	Entity {
		#[serde(rename = "entity_kind")]
		kind: String,
		id: Option<String>,
	},

	/// A monetary operation, amount in minor currency units.
	Amount { amount: i64, category: Option<String> },
}

impl PolicyContext {
	pub fn http(method: impl Into<String>, path: impl Into<String>) -> Self {
		Self::Http {
			method: method.into(),
			path: path.into(),
			route_params: BTreeMap::new(),
		}
	}

	pub fn amount(amount: i64) -> Self {
		Self::Amount {
			amount,
			category: None,
		}
	}

	pub fn amount_in(amount: i64, category: impl Into<String>) -> Self {
		Self::Amount {
			amount,
			category: Some(category.into()),
		}
	}
}

/// Constraints an allowing policy hands back for result narrowing.
///
/// Handlers apply these after authorization: a subject may be allowed to
/// list artworks while only seeing those under a price ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyFilterContext {
	/// Restrict visible prices to this window, minor currency units.
	PriceWindow { min: Option<i64>, max: Option<i64> },

	/// Restrict results to these categories.
	CategoryAllowList { categories: BTreeSet<String> },

	/// Cap the monetary amount the subject may approve.
	ApprovalCeiling { limit: i64 },
}

/// Outcome of evaluating one policy for one call.
///
/// Ephemeral by contract: produced, acted on, discarded. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
	pub allowed: bool,

	/// Human-readable denial reason. Safe to surface to callers; policies
	/// must not leak internal state here.
	pub reason: Option<String>,

	/// Present only on allow, and only when the policy narrows results.
	pub filter: Option<PolicyFilterContext>,
}

impl PolicyDecision {
	pub fn allow() -> Self {
		Self {
			allowed: true,
			reason: None,
			filter: None,
		}
	}

	pub fn allow_with_filter(filter: PolicyFilterContext) -> Self {
		Self {
			allowed: true,
			reason: None,
			filter: Some(filter),
		}
	}

	pub fn deny(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: Some(reason.into()),
			filter: None,
		}
	}

	pub fn is_allowed(&self) -> bool {
		self.allowed
	}
}
