// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The uniform subject context consumed by policy evaluation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// User id assigned when an assertion carries no usable subject.
pub const ANONYMOUS_USER: &str = "anonymous";

/// A custom attribute value: plain text or an integer.
///
/// Attributes sourced from identity assertions are only ever one of these
/// two shapes; anything else is dropped at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
	Int(i64),
	Text(String),
}

impl AttrValue {
	/// Parses raw claim text: integers stay integers, everything else is text.
	pub fn parse(raw: &str) -> Self {
		match raw.trim().parse::<i64>() {
			Ok(int) => Self::Int(int),
			Err(_) => Self::Text(raw.to_string()),
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(value) => Some(*value),
			Self::Text(_) => None,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Int(_) => None,
			Self::Text(value) => Some(value),
		}
	}
}

impl From<i64> for AttrValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<String> for AttrValue {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<&str> for AttrValue {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl std::fmt::Display for AttrValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Int(value) => write!(f, "{value}"),
			Self::Text(value) => f.write_str(value),
		}
	}
}

/// Everything policy evaluation knows about the caller.
///
/// Built once per request from a validated identity assertion (or from the
/// anonymous fallback) and never mutated afterwards. Roles are normalized
/// to lowercase at construction so role checks are case-insensitive by
/// construction rather than by convention at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaimsContext {
	/// Stable subject identifier, or [`ANONYMOUS_USER`].
	pub user_id: String,

	/// Granted roles, lowercase. Roles scoped to a resource carry a
	/// `resource:` prefix (for example `billing:approver`).
	pub roles: BTreeSet<String>,

	/// Granted permission strings, for example `artwork:view`.
	pub permissions: BTreeSet<String>,

	/// Raw claim values by claim type. First occurrence wins when a claim
	/// type appears more than once across sources.
	pub claims: BTreeMap<String, String>,

	/// Custom attributes carried for policy decisions.
	pub attributes: BTreeMap<String, AttrValue>,
}

impl UserClaimsContext {
	pub fn new(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			roles: BTreeSet::new(),
			permissions: BTreeSet::new(),
			claims: BTreeMap::new(),
			attributes: BTreeMap::new(),
		}
	}

	/// Context for an unauthenticated caller. Policies decide what, if
	/// anything, an anonymous subject may do.
	pub fn anonymous() -> Self {
		Self::new(ANONYMOUS_USER)
	}

	pub fn is_anonymous(&self) -> bool {
		self.user_id == ANONYMOUS_USER
	}

	pub fn with_role(mut self, role: impl AsRef<str>) -> Self {
		self.roles.insert(role.as_ref().to_lowercase());
		self
	}

	pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
		self.permissions.insert(permission.into());
		self
	}

	pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
		self.claims.entry(claim_type.into()).or_insert_with(|| value.into());
		self
	}

	pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
		self.attributes.insert(name.into(), value.into());
		self
	}

	/// Case-insensitive role membership check.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.contains(&role.to_lowercase())
	}

	/// True when the subject holds at least one of `roles`.
	pub fn has_any_role<'a, I>(&self, roles: I) -> bool
	where
		I: IntoIterator<Item = &'a str>,
	{
		roles.into_iter().any(|role| self.has_role(role))
	}

	/// Exact-match permission check.
	pub fn has_permission(&self, permission: &str) -> bool {
		self.permissions.contains(permission)
	}

	pub fn claim(&self, claim_type: &str) -> Option<&str> {
		self.claims.get(claim_type).map(String::as_str)
	}

	pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
		self.attributes.get(name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod roles {
		use super::*;

		#[test]
		fn role_checks_are_case_insensitive() {
			let ctx = UserClaimsContext::new("u1").with_role("Admin");
			assert!(ctx.has_role("admin"));
			assert!(ctx.has_role("ADMIN"));
			assert!(ctx.has_role("Admin"));
			assert!(!ctx.has_role("manager"));
		}

		#[test]
		fn roles_are_stored_lowercase() {
			let ctx = UserClaimsContext::new("u1").with_role("SENIOR-Buyer");
			assert!(ctx.roles.contains("senior-buyer"));
		}

		#[test]
		fn has_any_role_matches_first_hit() {
			let ctx = UserClaimsContext::new("u1").with_role("curator");
			assert!(ctx.has_any_role(["admin", "curator"]));
			assert!(!ctx.has_any_role(["admin", "manager"]));
			assert!(!ctx.has_any_role([]));
		}
	}

	mod claims_and_attributes {
		use super::*;

		#[test]
		fn first_claim_occurrence_wins() {
			let ctx = UserClaimsContext::new("u1")
				.with_claim("department", "art")
				.with_claim("department", "finance");
			assert_eq!(ctx.claim("department"), Some("art"));
		}

		#[test]
		fn attributes_accept_text_and_integers() {
			let ctx = UserClaimsContext::new("u1")
				.with_attribute("tier", "gold")
				.with_attribute("max_items", 25i64);
			assert_eq!(ctx.attribute("tier").and_then(AttrValue::as_text), Some("gold"));
			assert_eq!(ctx.attribute("max_items").and_then(AttrValue::as_int), Some(25));
		}

		#[test]
		fn attr_value_accessors_reject_wrong_shape() {
			assert_eq!(AttrValue::from("text").as_int(), None);
			assert_eq!(AttrValue::from(5i64).as_text(), None);
		}
	}

	mod anonymous {
		use super::*;

		#[test]
		fn anonymous_context_has_no_grants() {
			let ctx = UserClaimsContext::anonymous();
			assert!(ctx.is_anonymous());
			assert_eq!(ctx.user_id, ANONYMOUS_USER);
			assert!(ctx.roles.is_empty());
			assert!(ctx.permissions.is_empty());
		}

		#[test]
		fn named_subject_is_not_anonymous() {
			assert!(!UserClaimsContext::new("u1").is_anonymous());
		}
	}

	mod serde_shape {
		use super::*;

		#[test]
		fn attr_values_serialize_untagged() {
			let text = serde_json::to_string(&AttrValue::from("gold")).unwrap();
			let int = serde_json::to_string(&AttrValue::from(9i64)).unwrap();
			assert_eq!(text, "\"gold\"");
			assert_eq!(int, "9");
		}

		#[test]
		fn context_round_trips() {
			let ctx = UserClaimsContext::new("u1")
				.with_role("admin")
				.with_permission("artwork:view")
				.with_claim("email", "u1@example.com")
				.with_attribute("region", "emea");
			let json = serde_json::to_string(&ctx).unwrap();
			let back: UserClaimsContext = serde_json::from_str(&json).unwrap();
			assert_eq!(back, ctx);
		}
	}
}
