// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ready-made policies for the dominant authorization patterns.
//!
//! Most protected operations follow one of a handful of shapes: "needs
//! this permission or one of these roles", "respect the subject's price
//! window", "restrict to the subject's categories", "cap what the subject
//! may approve". These are constructed, named, and registered rather than
//! re-implemented per operation.

use std::sync::Arc;

use warden_claims::UserClaimsContext;

use crate::config::PolicyConfigResolver;
use crate::engine::{Policy, PolicyError};
use crate::types::{PolicyContext, PolicyDecision, PolicyFilterContext};

/// Allows when the subject holds a specific permission or any of a set of
/// roles. The hybrid shape nearly every per-entity policy takes.
pub struct PermissionOrRole {
	name: String,
	permission: String,
	roles: Vec<String>,
}

impl PermissionOrRole {
	pub fn new<I, R>(name: impl Into<String>, permission: impl Into<String>, roles: I) -> Self
	where
		I: IntoIterator<Item = R>,
		R: AsRef<str>,
	{
		Self {
			name: name.into(),
			permission: permission.into(),
			roles: roles
				.into_iter()
				.map(|role| role.as_ref().to_lowercase())
				.collect(),
		}
	}
}

impl Policy for PermissionOrRole {
	fn name(&self) -> &str {
		&self.name
	}

	fn evaluate(
		&self,
		subject: &UserClaimsContext,
		_call: &PolicyContext,
	) -> Result<PolicyDecision, PolicyError> {
		if subject.has_permission(&self.permission) {
			return Ok(PolicyDecision::allow());
		}
		if subject.has_any_role(self.roles.iter().map(String::as_str)) {
			return Ok(PolicyDecision::allow());
		}
		Ok(PolicyDecision::deny(format!(
			"requires permission \"{}\" or one of roles [{}]",
			self.permission,
			self.roles.join(", ")
		)))
	}
}

/// Enforces the subject's resolved price window on monetary calls and
/// reports it as a filter for list narrowing.
pub struct PriceWindowPolicy {
	name: String,
	resolver: Arc<PolicyConfigResolver>,
}

impl PriceWindowPolicy {
	pub fn new(name: impl Into<String>, resolver: Arc<PolicyConfigResolver>) -> Self {
		Self {
			name: name.into(),
			resolver,
		}
	}
}

impl Policy for PriceWindowPolicy {
	fn name(&self) -> &str {
		&self.name
	}

	fn evaluate(
		&self,
		subject: &UserClaimsContext,
		call: &PolicyContext,
	) -> Result<PolicyDecision, PolicyError> {
		let config = self.resolver.effective(subject);
		let (min, max) = (config.min_price, config.max_price);

		if let PolicyContext::Amount { amount, .. } = call {
			if let Some(max) = max {
				if *amount > max {
					return Ok(PolicyDecision::deny(format!(
						"amount {amount} exceeds the maximum price {max}"
					)));
				}
			}
			if let Some(min) = min {
				if *amount < min {
					return Ok(PolicyDecision::deny(format!(
						"amount {amount} is below the minimum price {min}"
					)));
				}
			}
		}

		Ok(match (min, max) {
			(None, None) => PolicyDecision::allow(),
			_ => PolicyDecision::allow_with_filter(PolicyFilterContext::PriceWindow { min, max }),
		})
	}
}

/// Enforces the subject's resolved category allow-list.
///
/// A subject with no configured list is unrestricted.
pub struct CategoryPolicy {
	name: String,
	resolver: Arc<PolicyConfigResolver>,
}

impl CategoryPolicy {
	pub fn new(name: impl Into<String>, resolver: Arc<PolicyConfigResolver>) -> Self {
		Self {
			name: name.into(),
			resolver,
		}
	}
}

impl Policy for CategoryPolicy {
	fn name(&self) -> &str {
		&self.name
	}

	fn evaluate(
		&self,
		subject: &UserClaimsContext,
		call: &PolicyContext,
	) -> Result<PolicyDecision, PolicyError> {
		let config = self.resolver.effective(subject);
		let Some(categories) = config.allowed_categories else {
			return Ok(PolicyDecision::allow());
		};

		if let PolicyContext::Amount {
			category: Some(category),
			..
		} = call
		{
			if !categories.contains(category) {
				return Ok(PolicyDecision::deny(format!(
					"category \"{category}\" is not in the subject's allowed set"
				)));
			}
		}

		Ok(PolicyDecision::allow_with_filter(
			PolicyFilterContext::CategoryAllowList { categories },
		))
	}
}

/// Caps the monetary amount the subject may approve.
pub struct ApprovalLimitPolicy {
	name: String,
	resolver: Arc<PolicyConfigResolver>,
}

impl ApprovalLimitPolicy {
	pub fn new(name: impl Into<String>, resolver: Arc<PolicyConfigResolver>) -> Self {
		Self {
			name: name.into(),
			resolver,
		}
	}
}

impl Policy for ApprovalLimitPolicy {
	fn name(&self) -> &str {
		&self.name
	}

	fn evaluate(
		&self,
		subject: &UserClaimsContext,
		call: &PolicyContext,
	) -> Result<PolicyDecision, PolicyError> {
		let config = self.resolver.effective(subject);
		let Some(limit) = config.approval_limit else {
			return Ok(PolicyDecision::allow());
		};

		if let PolicyContext::Amount { amount, .. } = call {
			if *amount > limit {
				return Ok(PolicyDecision::deny(format!(
					"amount {amount} exceeds the approval limit {limit}"
				)));
			}
		}

		Ok(PolicyDecision::allow_with_filter(
			PolicyFilterContext::ApprovalCeiling { limit },
		))
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use crate::config::PolicyConfig;

	use super::*;

	fn resolver(defaults: PolicyConfig) -> Arc<PolicyConfigResolver> {
		Arc::new(PolicyConfigResolver::new(defaults))
	}

	mod permission_or_role {
		use super::*;

		fn policy() -> PermissionOrRole {
			PermissionOrRole::new("artwork:view", "artwork:view", ["admin", "curator"])
		}

		#[test]
		fn permission_alone_allows() {
			let subject = UserClaimsContext::new("u1").with_permission("artwork:view");
			let decision = policy().evaluate(&subject, &PolicyContext::None).unwrap();
			assert!(decision.is_allowed());
		}

		#[test]
		fn role_alone_allows() {
			let subject = UserClaimsContext::new("u1").with_role("Admin");
			let decision = policy().evaluate(&subject, &PolicyContext::None).unwrap();
			assert!(decision.is_allowed());
		}

		#[test]
		fn configured_roles_match_case_insensitively() {
			let policy = PermissionOrRole::new("p", "perm", ["CURATOR"]);
			let subject = UserClaimsContext::new("u1").with_role("curator");
			assert!(policy.evaluate(&subject, &PolicyContext::None).unwrap().is_allowed());
		}

		#[test]
		fn neither_grant_denies_and_names_the_requirement() {
			let subject = UserClaimsContext::new("u1").with_role("viewer");
			let decision = policy().evaluate(&subject, &PolicyContext::None).unwrap();
			assert!(!decision.is_allowed());
			let reason = decision.reason.unwrap();
			assert!(reason.contains("artwork:view"));
			assert!(reason.contains("admin"));
			assert!(reason.contains("curator"));
		}

		#[test]
		fn anonymous_subject_denies() {
			let decision = policy()
				.evaluate(&UserClaimsContext::anonymous(), &PolicyContext::None)
				.unwrap();
			assert!(!decision.is_allowed());
		}
	}

	mod price_window {
		use super::*;

		fn policy() -> PriceWindowPolicy {
			PriceWindowPolicy::new(
				"pricing:window",
				resolver(PolicyConfig {
					min_price: Some(100),
					max_price: Some(5_000_000),
					..PolicyConfig::default()
				}),
			)
		}

		#[test]
		fn amount_inside_the_window_allows_with_filter() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy().evaluate(&subject, &PolicyContext::amount(2_500)).unwrap();
			assert!(decision.is_allowed());
			assert_eq!(
				decision.filter,
				Some(PolicyFilterContext::PriceWindow {
					min: Some(100),
					max: Some(5_000_000),
				})
			);
		}

		#[test]
		fn amount_above_the_ceiling_denies() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy()
				.evaluate(&subject, &PolicyContext::amount(6_000_000))
				.unwrap();
			assert!(!decision.is_allowed());
			assert!(decision.reason.unwrap().contains("maximum price"));
		}

		#[test]
		fn amount_below_the_floor_denies() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy().evaluate(&subject, &PolicyContext::amount(50)).unwrap();
			assert!(!decision.is_allowed());
			assert!(decision.reason.unwrap().contains("minimum price"));
		}

		#[test]
		fn non_monetary_calls_only_report_the_window() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy()
				.evaluate(&subject, &PolicyContext::http("GET", "/api/artworks"))
				.unwrap();
			assert!(decision.is_allowed());
			assert!(matches!(
				decision.filter,
				Some(PolicyFilterContext::PriceWindow { .. })
			));
		}

		#[test]
		fn unlimited_subject_allows_without_filter() {
			let policy = PriceWindowPolicy::new("pricing:window", resolver(PolicyConfig::default()));
			let subject = UserClaimsContext::new("u1");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount(10_000_000))
				.unwrap();
			assert!(decision.is_allowed());
			assert_eq!(decision.filter, None);
		}

		#[test]
		fn claims_layer_extends_the_window() {
			let policy = PriceWindowPolicy::new(
				"pricing:window",
				resolver(PolicyConfig {
					max_price: Some(5_000_000),
					..PolicyConfig::default()
				}),
			);
			let subject = UserClaimsContext::new("u1").with_claim("policy:max_price", "20000000");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount(19_000_000))
				.unwrap();
			assert!(decision.is_allowed());
		}
	}

	mod category {
		use super::*;

		fn allowed(categories: &[&str]) -> PolicyConfig {
			PolicyConfig {
				allowed_categories: Some(categories.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>()),
				..PolicyConfig::default()
			}
		}

		#[test]
		fn listed_category_allows_with_filter() {
			let policy = CategoryPolicy::new("catalog:categories", resolver(allowed(&["painting"])));
			let subject = UserClaimsContext::new("u1");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount_in(100, "painting"))
				.unwrap();
			assert!(decision.is_allowed());
			assert!(matches!(
				decision.filter,
				Some(PolicyFilterContext::CategoryAllowList { .. })
			));
		}

		#[test]
		fn unlisted_category_denies() {
			let policy = CategoryPolicy::new("catalog:categories", resolver(allowed(&["painting"])));
			let subject = UserClaimsContext::new("u1");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount_in(100, "sculpture"))
				.unwrap();
			assert!(!decision.is_allowed());
			assert!(decision.reason.unwrap().contains("sculpture"));
		}

		#[test]
		fn no_configured_list_means_unrestricted() {
			let policy = CategoryPolicy::new("catalog:categories", resolver(PolicyConfig::default()));
			let subject = UserClaimsContext::new("u1");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount_in(100, "anything"))
				.unwrap();
			assert!(decision.is_allowed());
			assert_eq!(decision.filter, None);
		}
	}

	mod approval_limit {
		use super::*;

		fn policy() -> ApprovalLimitPolicy {
			ApprovalLimitPolicy::new(
				"orders:approve",
				resolver(PolicyConfig {
					approval_limit: Some(1_000_000),
					..PolicyConfig::default()
				}),
			)
		}

		#[test]
		fn amount_within_limit_allows_with_ceiling_filter() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy().evaluate(&subject, &PolicyContext::amount(999_999)).unwrap();
			assert!(decision.is_allowed());
			assert_eq!(
				decision.filter,
				Some(PolicyFilterContext::ApprovalCeiling { limit: 1_000_000 })
			);
		}

		#[test]
		fn amount_over_limit_denies() {
			let subject = UserClaimsContext::new("u1");
			let decision = policy()
				.evaluate(&subject, &PolicyContext::amount(1_000_001))
				.unwrap();
			assert!(!decision.is_allowed());
		}

		#[test]
		fn no_limit_configured_allows_everything() {
			let policy = ApprovalLimitPolicy::new("orders:approve", resolver(PolicyConfig::default()));
			let subject = UserClaimsContext::new("u1");
			let decision = policy
				.evaluate(&subject, &PolicyContext::amount(i64::MAX))
				.unwrap();
			assert!(decision.is_allowed());
			assert_eq!(decision.filter, None);
		}
	}
}
