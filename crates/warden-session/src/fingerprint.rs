// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client fingerprinting for weak session binding.
//!
//! A fingerprint is a SHA-256 over a handful of connection and header
//! attributes, captured when a session is created and compared on later
//! requests. It is a tripwire, not an authenticator: legitimate clients
//! change networks and browsers update their headers, so a mismatch is
//! logged as a signal rather than enforced as a denial.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, USER_AGENT};
use http::HeaderMap;
use sha2::{Digest, Sha256};

/// The request attributes a fingerprint is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
	pub client_ip: Option<String>,
	pub user_agent: Option<String>,
	pub accept_language: Option<String>,
	pub accept_encoding: Option<String>,
	pub accept: Option<String>,
}

impl ClientContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Captures header attributes from a request, with the caller supplying
	/// the peer address (the header map does not know it).
	pub fn from_headers(client_ip: Option<String>, headers: &HeaderMap) -> Self {
		let header = |name| {
			headers
				.get(name)
				.and_then(|value| value.to_str().ok())
				.map(str::to_string)
		};
		Self {
			client_ip,
			user_agent: header(USER_AGENT),
			accept_language: header(ACCEPT_LANGUAGE),
			accept_encoding: header(ACCEPT_ENCODING),
			accept: header(ACCEPT),
		}
	}

	pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
		self.client_ip = Some(client_ip.into());
		self
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn with_accept_language(mut self, accept_language: impl Into<String>) -> Self {
		self.accept_language = Some(accept_language.into());
		self
	}

	pub fn with_accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
		self.accept_encoding = Some(accept_encoding.into());
		self
	}

	pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
		self.accept = Some(accept.into());
		self
	}

	/// base64(SHA-256) over the joined attributes. Absent attributes hash
	/// as empty strings, so the value is always computable.
	pub fn fingerprint(&self) -> String {
		let joined = format!(
			"{}|{}|{}|{}|{}",
			self.client_ip.as_deref().unwrap_or(""),
			self.user_agent.as_deref().unwrap_or(""),
			self.accept_language.as_deref().unwrap_or(""),
			self.accept_encoding.as_deref().unwrap_or(""),
			self.accept.as_deref().unwrap_or(""),
		);
		STANDARD.encode(Sha256::digest(joined.as_bytes()))
	}
}
