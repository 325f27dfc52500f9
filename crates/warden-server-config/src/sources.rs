// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace, warn};
use warden_common_secret::SecretString;

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	HandoffConfigLayer, HttpConfigLayer, LoggingConfigLayer, OidcConfigLayer, PkceConfigLayer,
	PolicyConfigLayer, SessionConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/warden/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: WARDEN_SERVER_<SECTION>_<FIELD>, except the identity
/// provider section which shares the WARDEN_OIDC_* namespace with
/// `warden_oidc::OidcConfig::from_env`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			oidc: Some(load_oidc_from_env()?),
			session: Some(load_session_from_env()?),
			pkce: Some(load_pkce_from_env()?),
			handoff: Some(load_handoff_from_env()?),
			policy: Some(load_policy_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_i64(name: &str) -> Result<Option<i64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid i64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

/// Loads a secret from `name`, or from the file named by `<name>_FILE`.
///
/// The file indirection supports deployments that mount secrets on disk
/// instead of placing them in process environments. File contents are
/// trimmed of trailing whitespace (mounted secrets usually end with a
/// newline).
pub fn load_secret_env(name: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{name}_FILE");
	if let Some(path) = env_var(&file_var) {
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			ConfigError::Secret(format!("failed to read {file_var} path {path}: {e}"))
		})?;
		return Ok(Some(SecretString::new(contents.trim_end().to_string())));
	}

	Ok(env_var(name).map(SecretString::new))
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("WARDEN_SERVER_HOST"),
		port: env_u16("WARDEN_SERVER_PORT")?,
		base_url: env_var("WARDEN_SERVER_BASE_URL"),
		allowed_redirects: env_list("WARDEN_SERVER_ALLOWED_REDIRECTS"),
	})
}

fn load_oidc_from_env() -> Result<OidcConfigLayer, ConfigError> {
	Ok(OidcConfigLayer {
		authorize_endpoint: env_var("WARDEN_OIDC_AUTHORIZE_ENDPOINT"),
		token_endpoint: env_var("WARDEN_OIDC_TOKEN_ENDPOINT"),
		revocation_endpoint: env_var("WARDEN_OIDC_REVOCATION_ENDPOINT"),
		client_id: env_var("WARDEN_OIDC_CLIENT_ID"),
		client_secret: load_secret_env("WARDEN_OIDC_CLIENT_SECRET")?,
		redirect_uri: env_var("WARDEN_OIDC_REDIRECT_URI"),
		scopes: env_list("WARDEN_OIDC_SCOPES"),
	})
}

fn load_session_from_env() -> Result<SessionConfigLayer, ConfigError> {
	Ok(SessionConfigLayer {
		ttl_minutes: env_i64("WARDEN_SERVER_SESSION_TTL_MINUTES")?,
		cookie_name: env_var("WARDEN_SERVER_SESSION_COOKIE_NAME"),
		cookie_secure: env_bool("WARDEN_SERVER_SESSION_COOKIE_SECURE"),
	})
}

fn load_pkce_from_env() -> Result<PkceConfigLayer, ConfigError> {
	Ok(PkceConfigLayer {
		ttl_minutes: env_i64("WARDEN_SERVER_PKCE_TTL_MINUTES")?,
	})
}

fn load_handoff_from_env() -> Result<HandoffConfigLayer, ConfigError> {
	Ok(HandoffConfigLayer {
		ttl_seconds: env_i64("WARDEN_SERVER_HANDOFF_TTL_SECS")?,
	})
}

fn load_policy_from_env() -> Result<PolicyConfigLayer, ConfigError> {
	// Structured values travel as JSON blobs, e.g.
	// WARDEN_SERVER_POLICY_ROLES='{"manager":{"max_price":8000000}}'
	// A malformed value is logged and skipped; a bad admin value must not
	// keep the server from starting.
	Ok(PolicyConfigLayer {
		defaults: env_json("WARDEN_SERVER_POLICY_DEFAULTS"),
		roles: env_json("WARDEN_SERVER_POLICY_ROLES"),
	})
}

fn env_json<T: serde::de::DeserializeOwned>(name: &str) -> Option<T> {
	let json = env_var(name)?;
	match serde_json::from_str(&json) {
		Ok(value) => Some(value),
		Err(err) => {
			warn!(key = name, error = %err, "ignoring malformed JSON value");
			None
		}
	}
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	Ok(LoggingConfigLayer {
		level: env_var("WARDEN_SERVER_LOG_LEVEL"),
		json: env_bool("WARDEN_SERVER_LOG_JSON"),
	})
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let source = DefaultsSource;
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.policy.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/config.toml");
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
	}

	#[test]
	fn test_toml_source_parses_sections() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
            [http]
            port = 9000
            allowed_redirects = ["/", "/app"]

            [session]
            ttl_minutes = 120

            [policy.roles.manager]
            max_price = 8000000
        "#
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.http.as_ref().unwrap().port, Some(9000));
		assert_eq!(
			layer.http.unwrap().allowed_redirects,
			Some(vec!["/".to_string(), "/app".to_string()])
		);
		assert_eq!(layer.session.unwrap().ttl_minutes, Some(120));
		let roles = layer.policy.unwrap().roles.unwrap();
		assert_eq!(roles["manager"].max_price, Some(8_000_000));
	}

	#[test]
	fn test_toml_source_rejects_malformed_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "[http\nport = nine thousand").unwrap();

		let result = TomlSource::new(file.path()).load();
		assert!(matches!(result, Err(ConfigError::TomlParse { .. })));
	}

	#[test]
	fn test_load_secret_env_prefers_file_indirection() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-the-file").unwrap();

		// Env var names are unique per test to avoid cross-test races.
		std::env::set_var(
			"WARDEN_TEST_SECRET_A_FILE",
			file.path().to_str().unwrap(),
		);
		std::env::set_var("WARDEN_TEST_SECRET_A", "from-the-env");

		let secret = load_secret_env("WARDEN_TEST_SECRET_A").unwrap().unwrap();
		assert_eq!(secret.expose(), "from-the-file");

		std::env::remove_var("WARDEN_TEST_SECRET_A_FILE");
		std::env::remove_var("WARDEN_TEST_SECRET_A");
	}

	#[test]
	fn test_load_secret_env_absent_is_none() {
		assert!(load_secret_env("WARDEN_TEST_SECRET_B").unwrap().is_none());
	}

	#[test]
	fn test_env_json_swallows_malformed_values() {
		std::env::set_var("WARDEN_TEST_POLICY_JSON", "{not json");
		let parsed: Option<warden_policy::PolicyConfig> = env_json("WARDEN_TEST_POLICY_JSON");
		assert!(parsed.is_none());
		std::env::remove_var("WARDEN_TEST_POLICY_JSON");
	}

	#[test]
	fn test_env_json_parses_role_maps() {
		std::env::set_var(
			"WARDEN_TEST_ROLES_JSON",
			r#"{"manager":{"max_price":8000000}}"#,
		);
		let parsed: Option<std::collections::BTreeMap<String, warden_policy::PolicyConfig>> =
			env_json("WARDEN_TEST_ROLES_JSON");
		assert_eq!(parsed.unwrap()["manager"].max_price, Some(8_000_000));
		std::env::remove_var("WARDEN_TEST_ROLES_JSON");
	}
}
