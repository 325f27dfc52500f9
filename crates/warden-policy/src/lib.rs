// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy-based access control for the server.
//!
//! Protected operations name a policy; the evaluator looks it up in an
//! explicitly assembled registry and runs it against the subject's claims
//! context plus the call-site facts. Policies are pure and synchronous,
//! and a faulty policy (error or panic) degrades to a denial instead of
//! failing the request pipeline.
//!
//! ```text
//!   operation "POST /api/orders" (policy = "orders:approve")
//!        |
//!        v
//!   PolicyEvaluator::evaluate(name, subject, call)
//!        |                                |
//!        |  PolicyConfigResolver          |
//!        |  defaults -> roles -> claims   |
//!        v                                v
//!   PolicyDecision { allowed, reason, filter }
//! ```
//!
//! Subject limits (price window, categories, approval ceiling) resolve
//! through three layers with right-hand-wins merge semantics; see
//! [`config`]. Common policy shapes ship in [`builtin`].

pub mod builtin;
pub mod config;
pub mod engine;
pub mod types;

pub use builtin::{ApprovalLimitPolicy, CategoryPolicy, PermissionOrRole, PriceWindowPolicy};
pub use config::{PolicyConfig, PolicyConfigResolver};
pub use engine::{
	Policy, PolicyError, PolicyEvaluator, PolicyRegistry, DENY_POLICY_NOT_FOUND,
	DENY_POLICY_PANICKED,
};
pub use types::{PolicyContext, PolicyDecision, PolicyFilterContext};
