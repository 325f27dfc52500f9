// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Claims extraction from validated identity assertions.
//!
//! The input here is a JWT whose signature has already been verified
//! upstream (identity provider, gateway); this module never checks
//! signatures. Extraction is deliberately forgiving: a structurally valid
//! payload always yields a context, and individually malformed claims
//! degrade to "not granted" with a debug log rather than failing the
//! request.
//!
//! Role sources, unioned:
//!
//! - a flat `roles` claim (array, or space/comma separated string)
//! - `realm_access.roles`
//! - `resource_access.<resource>.roles`, namespaced as `<resource>:<role>`
//!
//! Permissions come from the space-delimited `scope` claim and an optional
//! `permissions` array. Custom attributes come from a small allow-list of
//! well-known claim types plus any claim prefixed `attr:` or `custom:`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::context::{AttrValue, UserClaimsContext, ANONYMOUS_USER};

/// Claim types lifted into attributes without any prefix.
const ATTRIBUTE_ALLOW_LIST: &[&str] = &["department", "region", "tier", "tenant"];

/// Claim type prefixes marking explicit custom attributes. The prefix is
/// stripped from the attribute name.
const ATTRIBUTE_PREFIXES: &[&str] = &["attr:", "custom:"];

/// Structural failures while decoding an assertion.
///
/// Semantic problems (missing subject, malformed role claims) never raise
/// these; they degrade inside [`extract_from_payload`].
#[derive(Debug, Error)]
pub enum ClaimsError {
	#[error("assertion is not a JWT: expected three dot-separated segments")]
	MalformedAssertion,

	#[error("assertion payload is not valid base64url: {0}")]
	PayloadEncoding(#[from] base64::DecodeError),

	#[error("assertion payload is not valid JSON: {0}")]
	PayloadJson(#[from] serde_json::Error),

	#[error("assertion payload is not a JSON object")]
	PayloadNotObject,
}

/// Decodes a validated assertion and extracts the subject context.
pub fn extract(assertion: &str) -> Result<UserClaimsContext, ClaimsError> {
	let payload = decode_payload(assertion)?;
	Ok(extract_from_payload(&payload))
}

/// Splits off and decodes the payload segment of a JWT.
pub(crate) fn decode_payload(assertion: &str) -> Result<Map<String, Value>, ClaimsError> {
	let mut segments = assertion.split('.');
	let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
		(Some(_header), Some(payload), Some(_signature), None) => payload,
		_ => return Err(ClaimsError::MalformedAssertion),
	};
	let bytes = URL_SAFE_NO_PAD.decode(payload)?;
	match serde_json::from_slice(&bytes)? {
		Value::Object(map) => Ok(map),
		_ => Err(ClaimsError::PayloadNotObject),
	}
}

/// The signature segment of a JWT, used as a cache key.
pub(crate) fn signature_segment(assertion: &str) -> Option<&str> {
	let mut segments = assertion.split('.');
	match (segments.next(), segments.next(), segments.next(), segments.next()) {
		(Some(_), Some(_), Some(signature), None) if !signature.is_empty() => Some(signature),
		_ => None,
	}
}

/// The `exp` claim as a timestamp, when present and in range.
pub(crate) fn payload_expiry(payload: &Map<String, Value>) -> Option<DateTime<Utc>> {
	let secs = payload.get("exp")?.as_i64()?;
	Utc.timestamp_opt(secs, 0).single()
}

/// Builds the subject context from a decoded payload. Infallible: malformed
/// individual claims contribute nothing.
pub fn extract_from_payload(payload: &Map<String, Value>) -> UserClaimsContext {
	let mut ctx = UserClaimsContext::new(subject(payload));
	collect_roles(payload, &mut ctx);
	collect_permissions(payload, &mut ctx);
	collect_claims(payload, &mut ctx);
	collect_attributes(payload, &mut ctx);
	ctx
}

fn subject(payload: &Map<String, Value>) -> String {
	for claim_type in ["sub", "preferred_username"] {
		if let Some(value) = payload.get(claim_type).and_then(Value::as_str) {
			let trimmed = value.trim();
			if !trimmed.is_empty() {
				return trimmed.to_string();
			}
		}
	}
	ANONYMOUS_USER.to_string()
}

fn collect_roles(payload: &Map<String, Value>, ctx: &mut UserClaimsContext) {
	if let Some(value) = payload.get("roles") {
		for role in string_list(value) {
			ctx.roles.insert(role.to_lowercase());
		}
	}

	match payload.get("realm_access") {
		None => {}
		Some(Value::Object(realm)) => {
			if let Some(roles) = realm.get("roles") {
				for role in string_list(roles) {
					ctx.roles.insert(role.to_lowercase());
				}
			}
		}
		Some(other) => {
			debug!(shape = json_kind(other), "ignoring malformed realm_access claim");
		}
	}

	match payload.get("resource_access") {
		None => {}
		Some(Value::Object(resources)) => {
			for (resource, grants) in resources {
				let Some(roles) = grants.as_object().and_then(|grants| grants.get("roles")) else {
					debug!(resource = %resource, "ignoring malformed resource_access entry");
					continue;
				};
				for role in string_list(roles) {
					ctx.roles.insert(format!("{}:{}", resource.to_lowercase(), role.to_lowercase()));
				}
			}
		}
		Some(other) => {
			debug!(shape = json_kind(other), "ignoring malformed resource_access claim");
		}
	}
}

fn collect_permissions(payload: &Map<String, Value>, ctx: &mut UserClaimsContext) {
	if let Some(scope) = payload.get("scope").and_then(Value::as_str) {
		for permission in scope.split_whitespace() {
			ctx.permissions.insert(permission.to_string());
		}
	}
	if let Some(value) = payload.get("permissions") {
		for permission in string_list(value) {
			ctx.permissions.insert(permission);
		}
	}
}

fn collect_claims(payload: &Map<String, Value>, ctx: &mut UserClaimsContext) {
	for (claim_type, value) in payload {
		let Some(rendered) = scalar_string(value) else {
			continue;
		};
		ctx.claims.entry(claim_type.clone()).or_insert(rendered);
	}
}

fn collect_attributes(payload: &Map<String, Value>, ctx: &mut UserClaimsContext) {
	for (claim_type, value) in payload {
		let name = if ATTRIBUTE_ALLOW_LIST.contains(&claim_type.as_str()) {
			claim_type.clone()
		} else if let Some(stripped) = ATTRIBUTE_PREFIXES
			.iter()
			.find_map(|prefix| claim_type.strip_prefix(prefix))
		{
			stripped.to_string()
		} else {
			continue;
		};

		match attr_value(value) {
			Some(attr) => {
				ctx.attributes.insert(name, attr);
			}
			None => {
				debug!(claim = %claim_type, "ignoring non-scalar attribute claim");
			}
		}
	}
}

/// Array of strings, or a single space/comma separated string.
fn string_list(value: &Value) -> Vec<String> {
	match value {
		Value::Array(items) => items
			.iter()
			.filter_map(Value::as_str)
			.map(str::to_string)
			.collect(),
		Value::String(joined) => joined
			.split([' ', ','])
			.filter(|part| !part.is_empty())
			.map(str::to_string)
			.collect(),
		_ => Vec::new(),
	}
}

fn scalar_string(value: &Value) -> Option<String> {
	match value {
		Value::String(text) => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		Value::Bool(flag) => Some(flag.to_string()),
		_ => None,
	}
}

/// Integers stay integers; strings that parse as integers are promoted.
fn attr_value(value: &Value) -> Option<AttrValue> {
	match value {
		Value::Number(number) => number.as_i64().map(AttrValue::Int),
		Value::String(text) => Some(AttrValue::parse(text)),
		_ => None,
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}


#[cfg(test)]
mod proptests {
	use proptest::prelude::*;
	use serde_json::json;

	use super::*;

	fn make_jwt(payload: Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
		format!("{header}.{body}.test-signature")
	}

	proptest! {
		#[test]
		fn extracted_roles_are_always_lowercase(
			roles in proptest::collection::vec("[A-Za-z0-9_:-]{1,16}", 0..8)
		) {
			let ctx = extract(&make_jwt(json!({"sub": "u", "roles": roles}))).unwrap();
			for role in &ctx.roles {
				prop_assert!(!role.chars().any(char::is_uppercase));
			}
		}

		#[test]
		fn arbitrary_scalar_payloads_never_panic(
			pairs in proptest::collection::btree_map("[a-z_:]{1,12}", "[ -~]{0,32}", 0..10)
		) {
			let payload = serde_json::to_value(&pairs).unwrap();
			let _ = extract(&make_jwt(payload));
		}

		#[test]
		fn subject_never_empty(sub in "[ -~]{0,24}") {
			let ctx = extract(&make_jwt(json!({"sub": sub}))).unwrap();
			prop_assert!(!ctx.user_id.is_empty());
		}
	}
}
