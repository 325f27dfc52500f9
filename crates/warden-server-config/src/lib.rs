// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Warden server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`WARDEN_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	load_secret_env, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource,
};

use tracing::{debug, info};
use warden_oidc::OidcConfig;

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	/// Absent when the provider section is missing required fields; the
	/// server boots, but login attempts fail with a clear error.
	pub oidc: Option<OidcConfig>,
	pub session: SessionConfig,
	pub pkce: PkceConfig,
	pub handoff: HandoffConfig,
	pub policy: PolicySettings,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_SERVER_*`, `WARDEN_OIDC_*`)
/// 2. Config file (`/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		oidc: layer.oidc.and_then(|l| l.finalize()),
		session: layer.session.unwrap_or_default().finalize(),
		pkce: layer.pkce.unwrap_or_default().finalize(),
		handoff: layer.handoff.unwrap_or_default().finalize(),
		policy: layer.policy.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		oidc_configured = config.oidc.is_some(),
		session_ttl_minutes = config.session.ttl_minutes,
		pkce_ttl_minutes = config.pkce.ttl_minutes,
		handoff_ttl_seconds = config.handoff.ttl_seconds,
		policy_roles = config.policy.roles.len(),
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.session.ttl_minutes <= 0 {
		return Err(ConfigError::Validation(format!(
			"session ttl_minutes must be positive, got {}",
			config.session.ttl_minutes
		)));
	}
	if config.pkce.ttl_minutes <= 0 {
		return Err(ConfigError::Validation(format!(
			"pkce ttl_minutes must be positive, got {}",
			config.pkce.ttl_minutes
		)));
	}
	if config.handoff.ttl_seconds <= 0 {
		return Err(ConfigError::Validation(format!(
			"handoff ttl_seconds must be positive, got {}",
			config.handoff.ttl_seconds
		)));
	}

	if config.http.base_url.starts_with("https://") && !config.session.cookie_secure {
		return Err(ConfigError::Validation(
			"session cookie_secure=false while the base URL is https. \
			 The session cookie would be sent over plain HTTP too. Remove \
			 WARDEN_SERVER_SESSION_COOKIE_SECURE or set it to true."
				.to_string(),
		));
	}

	if config.http.allowed_redirects.is_empty() {
		return Err(ConfigError::Validation(
			"allowed_redirects must contain at least one entry; the first \
			 entry doubles as the fallback destination"
				.to_string(),
		));
	}

	Ok(())
}
