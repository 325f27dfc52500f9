// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth 2.0 / OIDC token endpoint client for Warden.
//!
//! This crate covers the provider-facing half of the authorization-code
//! flow: exchanging a callback code (plus PKCE verifier) for tokens,
//! refreshing an access token, and best-effort revocation on logout.
//! Authorization URL construction lives with the PKCE flow manager,
//! which owns the verifier/challenge/state material the URL embeds.
//!
//! # Token endpoint contract
//!
//! The provider's token endpoint is called with
//! `grant_type=authorization_code` or `grant_type=refresh_token` and is
//! expected to answer with the standard response shape:
//!
//! ```json
//! {"access_token": "...", "refresh_token": "...", "id_token": "...",
//!  "token_type": "Bearer", "expires_in": 3600}
//! ```
//!
//! Error bodies (`{"error": "...", "error_description": "..."}`) are
//! probed before the success shape so a provider that reports errors
//! with a 200 status is still handled.
//!
//! # Security Considerations
//!
//! - The `client_secret` and every token in [`TokenResponse`] are wrapped
//!   in [`SecretString`] to prevent accidental logging.
//! - All tracing instrumentation skips sensitive parameters.
//! - Revocation failures are logged, never propagated: logout must not
//!   fail because the provider is down.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use warden_common_secret::SecretString;

const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email"];

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A required environment variable was not set.
	#[error("missing environment variable: {0}")]
	MissingEnvVar(String),

	/// A configuration value was empty or invalid.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
	/// The HTTP request failed (network error, timeout, etc.).
	#[error("HTTP request failed: {0}")]
	HttpRequest(#[from] reqwest::Error),

	/// The response could not be parsed as expected.
	#[error("failed to parse response: {0}")]
	ParseError(String),

	/// The provider returned an error response (invalid code, expired
	/// refresh token, etc.).
	#[error("identity provider error: {0}")]
	Provider(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the identity provider client.
///
/// The `client_secret` is wrapped in [`SecretString`] to prevent
/// accidental logging or exposure.
#[derive(Debug, Clone)]
pub struct OidcConfig {
	/// The provider's authorization endpoint, embedded into login
	/// redirects by the PKCE flow manager.
	pub authorize_endpoint: String,
	/// The provider's token endpoint.
	pub token_endpoint: String,
	/// The provider's RFC 7009 revocation endpoint, when it has one.
	pub revocation_endpoint: Option<String>,
	/// The OAuth application client ID.
	pub client_id: String,
	/// The OAuth application client secret (wrapped to prevent logging).
	pub client_secret: SecretString,
	/// The callback URL registered with the provider.
	pub redirect_uri: String,
	/// OAuth scopes to request (e.g., "openid", "profile").
	pub scopes: Vec<String>,
}

impl OidcConfig {
	/// Load configuration from environment variables.
	///
	/// # Required Environment Variables
	///
	/// - `WARDEN_OIDC_AUTHORIZE_ENDPOINT`: The provider's authorization endpoint.
	/// - `WARDEN_OIDC_TOKEN_ENDPOINT`: The provider's token endpoint.
	/// - `WARDEN_OIDC_CLIENT_ID`: The OAuth application's client ID.
	/// - `WARDEN_OIDC_CLIENT_SECRET`: The OAuth application's client secret.
	/// - `WARDEN_OIDC_REDIRECT_URI`: The callback URL for OAuth redirects.
	///
	/// # Optional Environment Variables
	///
	/// - `WARDEN_OIDC_REVOCATION_ENDPOINT`: The provider's revocation endpoint.
	/// - `WARDEN_OIDC_SCOPES`: Space or comma separated scopes; defaults to
	///   `openid profile email`.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::MissingEnvVar`] if any required variable is not set.
	pub fn from_env() -> Result<Self, ConfigError> {
		let authorize_endpoint = require_env("WARDEN_OIDC_AUTHORIZE_ENDPOINT")?;
		let token_endpoint = require_env("WARDEN_OIDC_TOKEN_ENDPOINT")?;
		let client_id = require_env("WARDEN_OIDC_CLIENT_ID")?;
		let client_secret = require_env("WARDEN_OIDC_CLIENT_SECRET")?;
		let redirect_uri = require_env("WARDEN_OIDC_REDIRECT_URI")?;

		let scopes = match env::var("WARDEN_OIDC_SCOPES") {
			Ok(raw) => Self::parse_scopes(&raw),
			Err(_) => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
		};

		Ok(Self {
			authorize_endpoint,
			token_endpoint,
			revocation_endpoint: env::var("WARDEN_OIDC_REVOCATION_ENDPOINT").ok(),
			client_id,
			client_secret: SecretString::new(client_secret),
			redirect_uri,
			scopes,
		})
	}

	/// Validate that all configuration fields are non-empty and that the
	/// endpoints parse as URLs.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::InvalidConfig`] naming the offending field.
	pub fn validate(&self) -> Result<(), ConfigError> {
		require_url("authorize_endpoint", &self.authorize_endpoint)?;
		require_url("token_endpoint", &self.token_endpoint)?;
		if let Some(endpoint) = &self.revocation_endpoint {
			require_url("revocation_endpoint", endpoint)?;
		}
		if self.client_id.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_id cannot be empty".to_string(),
			));
		}
		if self.client_secret.expose().is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_secret cannot be empty".to_string(),
			));
		}
		if self.redirect_uri.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"redirect_uri cannot be empty".to_string(),
			));
		}
		Ok(())
	}

	/// Join scopes into a space-separated string for the authorization URL.
	pub fn scopes_string(&self) -> String {
		self.scopes.join(" ")
	}

	/// Parse a scope string into a vector of individual scopes.
	pub fn parse_scopes(scope_str: &str) -> Vec<String> {
		scope_str
			.split([' ', ','])
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	}
}

fn require_env(name: &str) -> Result<String, ConfigError> {
	env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn require_url(field: &str, value: &str) -> Result<(), ConfigError> {
	if value.is_empty() {
		return Err(ConfigError::InvalidConfig(format!(
			"{field} cannot be empty"
		)));
	}
	Url::parse(value).map_err(|e| {
		ConfigError::InvalidConfig(format!("{field} is not a valid URL: {e}"))
	})?;
	Ok(())
}

// =============================================================================
// Response types
// =============================================================================

/// Response from the provider's token endpoint.
///
/// Every token field is wrapped in [`SecretString`]; use `.expose()` at
/// the point of use. `refresh_token` and `id_token` are optional because
/// providers omit them depending on grant type and requested scopes (a
/// refresh-token grant commonly returns no new refresh token).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	pub access_token: SecretString,
	#[serde(default)]
	pub refresh_token: Option<SecretString>,
	#[serde(default)]
	pub id_token: Option<SecretString>,
	/// The token type (normally "Bearer").
	pub token_type: String,
	/// Access token lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Granted scopes, when the provider reports them.
	#[serde(default)]
	pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidcErrorResponse {
	error: String,
	error_description: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Client for the provider's token and revocation endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use warden_oidc::{OidcClient, OidcConfig};
///
/// # async fn example(code_verifier: &warden_common_secret::SecretString) -> Result<(), Box<dyn std::error::Error>> {
/// let config = OidcConfig::from_env()?;
/// config.validate()?;
/// let client = OidcClient::new(config);
///
/// let tokens = client.exchange_code("code-from-callback", code_verifier).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OidcClient {
	config: OidcConfig,
	http_client: reqwest::Client,
}

impl OidcClient {
	/// Create a new client with the given configuration.
	///
	/// # Panics
	///
	/// Panics if the HTTP client cannot be built (should never happen in practice).
	#[tracing::instrument(skip_all, name = "OidcClient::new")]
	pub fn new(config: OidcConfig) -> Self {
		let http_client = reqwest::Client::builder()
			.user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
			.timeout(HTTP_TIMEOUT)
			.build()
			.expect("failed to build HTTP client");

		Self {
			config,
			http_client,
		}
	}

	pub fn config(&self) -> &OidcConfig {
		&self.config
	}

	/// Exchange an authorization code for tokens.
	///
	/// # Arguments
	///
	/// - `code`: The authorization code from the OAuth callback.
	/// - `code_verifier`: The PKCE verifier generated at login start; the
	///   provider recomputes the challenge from it and rejects mismatches.
	///
	/// # Errors
	///
	/// - [`OidcError::HttpRequest`]: Network error or timeout.
	/// - [`OidcError::Provider`]: The provider rejected the code (expired,
	///   replayed, verifier mismatch).
	/// - [`OidcError::ParseError`]: Unexpected response format.
	#[tracing::instrument(skip(self, code, code_verifier), name = "OidcClient::exchange_code")]
	pub async fn exchange_code(
		&self,
		code: &str,
		code_verifier: &SecretString,
	) -> Result<TokenResponse, OidcError> {
		tracing::debug!("exchanging authorization code for tokens");

		self
			.request_tokens(&[
				("grant_type", "authorization_code"),
				("code", code),
				("redirect_uri", self.config.redirect_uri.as_str()),
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose().as_str()),
				("code_verifier", code_verifier.expose().as_str()),
			])
			.await
	}

	/// Exchange a refresh token for a fresh access token.
	///
	/// The provider may or may not rotate the refresh token; callers must
	/// treat an absent `refresh_token` in the response as "keep the old
	/// one".
	///
	/// # Errors
	///
	/// Same taxonomy as [`exchange_code`](Self::exchange_code).
	#[tracing::instrument(skip(self, refresh_token), name = "OidcClient::refresh")]
	pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenResponse, OidcError> {
		tracing::debug!("refreshing access token");

		self
			.request_tokens(&[
				("grant_type", "refresh_token"),
				("refresh_token", refresh_token.expose().as_str()),
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose().as_str()),
			])
			.await
	}

	/// Best-effort RFC 7009 token revocation.
	///
	/// A no-op when the provider has no revocation endpoint. Failures are
	/// logged and swallowed: this runs on the logout path, which must
	/// succeed locally even when the provider is unreachable.
	#[tracing::instrument(skip(self, token), name = "OidcClient::revoke")]
	pub async fn revoke(&self, token: &SecretString, token_type_hint: &str) {
		let Some(endpoint) = self.config.revocation_endpoint.as_deref() else {
			tracing::debug!("no revocation endpoint configured, skipping revocation");
			return;
		};

		let result = self
			.http_client
			.post(endpoint)
			.form(&[
				("token", token.expose().as_str()),
				("token_type_hint", token_type_hint),
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose().as_str()),
			])
			.send()
			.await;

		match result {
			Ok(response) if response.status().is_success() => {
				tracing::debug!(hint = token_type_hint, "revoked token");
			}
			Ok(response) => {
				tracing::warn!(status = %response.status(), hint = token_type_hint, "token revocation rejected");
			}
			Err(err) => {
				tracing::warn!(error = %err, hint = token_type_hint, "token revocation request failed");
			}
		}
	}

	async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OidcError> {
		let response = self
			.http_client
			.post(&self.config.token_endpoint)
			.header("Accept", "application/json")
			.form(form)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;

		// Probe the error shape first; some providers return errors with
		// a success status.
		if let Ok(error_response) = serde_json::from_str::<OidcErrorResponse>(&body) {
			if !error_response.error.is_empty() {
				let message = error_response
					.error_description
					.unwrap_or(error_response.error);
				return Err(OidcError::Provider(message));
			}
		}

		if !status.is_success() {
			return Err(OidcError::Provider(format!(
				"token endpoint returned {status}"
			)));
		}

		serde_json::from_str(&body)
			.map_err(|e| OidcError::ParseError(format!("failed to parse token response: {e}")))
	}
}
