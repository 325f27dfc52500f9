// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable configuration layer produced by every source.
//!
//! Each source yields one [`ServerConfigLayer`]; layers are folded in
//! precedence order and only then finalized into resolved config. Every
//! field is optional so a source only speaks for the keys it actually
//! sets.

use serde::{Deserialize, Serialize};

use crate::sections::{
	HandoffConfigLayer, HttpConfigLayer, LoggingConfigLayer, OidcConfigLayer, PkceConfigLayer,
	PolicyConfigLayer, SessionConfigLayer,
};

/// One source's sparse view of the full configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigLayer {
	pub http: Option<HttpConfigLayer>,
	pub oidc: Option<OidcConfigLayer>,
	pub session: Option<SessionConfigLayer>,
	pub pkce: Option<PkceConfigLayer>,
	pub handoff: Option<HandoffConfigLayer>,
	pub policy: Option<PolicyConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Folds `other` into `self`. Sections present on both sides merge
	/// field-wise; sections only `other` carries are adopted wholesale.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.oidc, other.oidc, OidcConfigLayer::merge);
		merge_section(&mut self.session, other.session, SessionConfigLayer::merge);
		merge_section(&mut self.pkce, other.pkce, PkceConfigLayer::merge);
		merge_section(&mut self.handoff, other.handoff, HandoffConfigLayer::merge);
		merge_section(&mut self.policy, other.policy, PolicyConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(target: &mut Option<T>, incoming: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(incoming) = incoming {
		match target {
			Some(existing) => merge(existing, incoming),
			None => *target = Some(incoming),
		}
	}
}
