// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Uniform JSON error responses.
//!
//! Every non-success response carries the same two-field body: a stable
//! machine-readable `error` code and a human-readable `message`. Messages
//! must be safe to show; anything sensitive belongs in the server log,
//! keyed by the same request.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable error code, snake_case.
	pub error: String,
	/// Human-readable description, safe to surface.
	pub message: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error: error.into(),
			message: message.into(),
		}
	}
}

pub fn bad_request(error: &str, message: &str) -> Response {
	(StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error, message))).into_response()
}

pub fn unauthorized() -> Response {
	(
		StatusCode::UNAUTHORIZED,
		Json(ErrorResponse::new("unauthorized", "Authentication required")),
	)
		.into_response()
}

/// 501 for operations that need an identity provider when none is
/// configured. Mirrors how unconfigured OAuth providers are reported.
pub fn provider_not_configured() -> Response {
	(
		StatusCode::NOT_IMPLEMENTED,
		Json(ErrorResponse::new(
			"provider_not_configured",
			"No identity provider is configured",
		)),
	)
		.into_response()
}

pub fn bad_gateway(error: &str, message: &str) -> Response {
	(StatusCode::BAD_GATEWAY, Json(ErrorResponse::new(error, message))).into_response()
}

pub fn internal_error() -> Response {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		Json(ErrorResponse::new("internal_error", "Internal server error")),
	)
		.into_response()
}
