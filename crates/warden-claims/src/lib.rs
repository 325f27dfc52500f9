// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Uniform subject context from validated identity assertions.
//!
//! Policy evaluation should never see raw tokens. This crate turns a
//! validated assertion (signature checked upstream) into a
//! [`UserClaimsContext`]: subject id, normalized roles, permissions, the
//! scalar claim map, and typed custom attributes. Extraction is forgiving
//! by contract; only structurally broken input fails.
//!
//! ```text
//!   bearer assertion (JWT, already validated)
//!        |
//!        v
//!   AssertionCache::get_or_extract     (keyed by signature segment)
//!        |
//!        v
//!   UserClaimsContext { user_id, roles, permissions, claims, attributes }
//! ```
//!
//! Everything downstream (policy configuration resolution, policy
//! evaluation, session identity) consumes the context, never the token.

pub mod cache;
pub mod context;
pub mod extract;

pub use cache::AssertionCache;
pub use context::{AttrValue, UserClaimsContext, ANONYMOUS_USER};
pub use extract::{extract, extract_from_payload, ClaimsError};
