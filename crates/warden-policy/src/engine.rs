// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy registration and fault-isolating evaluation.
//!
//! Policies are pure, synchronous, stateless functions from (subject, call
//! facts) to a decision. Registration is explicit: whatever assembles the
//! application builds a [`PolicyRegistry`] at startup and hands it to the
//! [`PolicyEvaluator`]. Nothing is discovered at runtime and there is no
//! global registry.
//!
//! # Fault isolation
//!
//! A broken policy must never break the request pipeline. The evaluator
//! converts every failure mode into a denial:
//!
//! - unknown policy name: deny, [`DENY_POLICY_NOT_FOUND`]
//! - policy returns `Err`: deny, with the error text as the reason
//! - policy panics: contained, deny, [`DENY_POLICY_PANICKED`]
//!
//! Evaluation itself therefore has no error type; `evaluate` always
//! returns a usable [`PolicyDecision`].

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use warden_claims::UserClaimsContext;

use crate::types::{PolicyContext, PolicyDecision};

/// Denial reason when no policy is registered under the requested name.
pub const DENY_POLICY_NOT_FOUND: &str = "policy not found";

/// Denial reason when a policy panicked during evaluation.
pub const DENY_POLICY_PANICKED: &str = "policy panicked";

/// Failure inside a single policy's own logic.
///
/// These surface to callers as denials, never as transport errors, so the
/// message must be safe to show.
#[derive(Debug, Error)]
pub enum PolicyError {
	/// The policy needs a call-site fact the context variant does not carry.
	#[error("missing call context: {0}")]
	MissingContext(&'static str),

	/// Anything else the policy wants to report.
	#[error("{0}")]
	Internal(String),
}

/// A named authorization rule.
///
/// Implementations must be pure: same inputs, same decision, no side
/// effects and no interior mutability. That keeps evaluation trivially
/// safe under concurrency and keeps decisions explainable.
pub trait Policy: Send + Sync {
	/// Registry key. Stable across releases; protected operations refer to
	/// policies by this name.
	fn name(&self) -> &str;

	fn evaluate(
		&self,
		subject: &UserClaimsContext,
		call: &PolicyContext,
	) -> Result<PolicyDecision, PolicyError>;
}

/// Name-keyed set of policies, assembled once at startup.
#[derive(Default)]
pub struct PolicyRegistry {
	policies: HashMap<String, Arc<dyn Policy>>,
}

impl PolicyRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `policy` under its own name. Re-registering a name
	/// replaces the previous policy and logs the replacement.
	pub fn register(&mut self, policy: Arc<dyn Policy>) {
		let name = policy.name().to_string();
		if self.policies.insert(name.clone(), policy).is_some() {
			warn!(policy = %name, "replacing previously registered policy");
		}
	}

	pub fn get(&self, name: &str) -> Option<&Arc<dyn Policy>> {
		self.policies.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.policies.contains_key(name)
	}

	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	pub fn len(&self) -> usize {
		self.policies.len()
	}

	pub fn is_empty(&self) -> bool {
		self.policies.is_empty()
	}
}

impl std::fmt::Debug for PolicyRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PolicyRegistry")
			.field("policies", &self.names())
			.finish()
	}
}

/// Evaluates named policies against a subject and call facts.
#[derive(Debug)]
pub struct PolicyEvaluator {
	registry: PolicyRegistry,
}

impl PolicyEvaluator {
	pub fn new(registry: PolicyRegistry) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &PolicyRegistry {
		&self.registry
	}

	/// Evaluates the policy registered under `name`. Infallible by design;
	/// every failure mode maps to a denial.
	#[instrument(skip(self, subject, call), fields(user = %subject.user_id))]
	pub fn evaluate(
		&self,
		name: &str,
		subject: &UserClaimsContext,
		call: &PolicyContext,
	) -> PolicyDecision {
		let Some(policy) = self.registry.get(name) else {
			warn!("authorization attempted against unregistered policy");
			return PolicyDecision::deny(DENY_POLICY_NOT_FOUND);
		};

		let outcome = catch_unwind(AssertUnwindSafe(|| policy.evaluate(subject, call)));
		match outcome {
			Ok(Ok(decision)) => {
				debug!(allowed = decision.allowed, "policy evaluated");
				decision
			}
			Ok(Err(err)) => {
				warn!(error = %err, "policy evaluation failed");
				PolicyDecision::deny(err.to_string())
			}
			Err(_) => {
				error!("policy panicked during evaluation");
				PolicyDecision::deny(DENY_POLICY_PANICKED)
			}
		}
	}
}
