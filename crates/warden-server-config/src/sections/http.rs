// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener configuration section.

use serde::{Deserialize, Serialize};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
	pub base_url: Option<String>,
	pub allowed_redirects: Option<Vec<String>>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.allowed_redirects.is_some() {
			self.allowed_redirects = other.allowed_redirects;
		}
	}

	pub fn finalize(self) -> HttpConfig {
		let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
		let port = self.port.unwrap_or(DEFAULT_PORT);
		let base_url = self
			.base_url
			.unwrap_or_else(|| format!("http://{host}:{port}"));

		HttpConfig {
			allowed_redirects: self
				.allowed_redirects
				.unwrap_or_else(|| vec!["/".to_string()]),
			host,
			port,
			base_url,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// Externally visible origin, used when constructing absolute URLs.
	pub base_url: String,
	/// Prefix allow-list for post-login redirect destinations. Login
	/// requests whose `redirect_uri` parameter matches none of these
	/// prefixes are sent to the first entry instead.
	pub allowed_redirects: Vec<String>,
}

impl Default for HttpConfig {
	fn default() -> Self {
		HttpConfigLayer::default().finalize()
	}
}
