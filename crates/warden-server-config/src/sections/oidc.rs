// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provider configuration section.
//!
//! Finalizes directly into [`warden_oidc::OidcConfig`]; the section is
//! optional as a whole, so a server can boot without a provider (every
//! login attempt then fails with a clear error) while the rest of the
//! stack runs.

use serde::{Deserialize, Serialize};
use warden_common_secret::SecretString;
use warden_oidc::OidcConfig;

fn default_scopes() -> Vec<String> {
	vec![
		"openid".to_string(),
		"profile".to_string(),
		"email".to_string(),
	]
}

// No PartialEq: client_secret is a SecretString, which deliberately has
// no equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OidcConfigLayer {
	pub authorize_endpoint: Option<String>,
	pub token_endpoint: Option<String>,
	pub revocation_endpoint: Option<String>,
	pub client_id: Option<String>,
	pub client_secret: Option<SecretString>,
	pub redirect_uri: Option<String>,
	pub scopes: Option<Vec<String>>,
}

impl OidcConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.authorize_endpoint.is_some() {
			self.authorize_endpoint = other.authorize_endpoint;
		}
		if other.token_endpoint.is_some() {
			self.token_endpoint = other.token_endpoint;
		}
		if other.revocation_endpoint.is_some() {
			self.revocation_endpoint = other.revocation_endpoint;
		}
		if other.client_id.is_some() {
			self.client_id = other.client_id;
		}
		if other.client_secret.is_some() {
			self.client_secret = other.client_secret;
		}
		if other.redirect_uri.is_some() {
			self.redirect_uri = other.redirect_uri;
		}
		if other.scopes.is_some() {
			self.scopes = other.scopes;
		}
	}

	/// `None` when any required field is missing; a partially configured
	/// provider is treated as no provider.
	pub fn finalize(self) -> Option<OidcConfig> {
		let authorize_endpoint = self.authorize_endpoint?;
		let token_endpoint = self.token_endpoint?;
		let client_id = self.client_id?;
		let client_secret = self.client_secret?;
		let redirect_uri = self.redirect_uri?;

		Some(OidcConfig {
			authorize_endpoint,
			token_endpoint,
			revocation_endpoint: self.revocation_endpoint,
			client_id,
			client_secret,
			redirect_uri,
			scopes: self.scopes.unwrap_or_else(default_scopes),
		})
	}
}
