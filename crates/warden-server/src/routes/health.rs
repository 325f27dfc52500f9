// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health check handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Duration;
use serde::Serialize;
use warden_store::KeyValueStore;

use crate::api::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
	Ok,
	Unavailable,
	NotConfigured,
}

#[derive(Debug, Serialize)]
pub struct HealthComponents {
	pub store: ComponentStatus,
	pub identity_provider: ComponentStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
	pub version: &'static str,
	pub timestamp: String,
	pub components: HealthComponents,
	/// Names of the registered policies, for operator sanity checks.
	pub policies: Vec<String>,
}

/// GET /health - readiness of the store and provider configuration.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let store = check_store(&state).await;
	let identity_provider = if state.oidc.is_some() {
		ComponentStatus::Ok
	} else {
		ComponentStatus::NotConfigured
	};

	// An unconfigured provider is a deployment choice, not an outage.
	let (status, http_status) = match store {
		ComponentStatus::Ok => ("ok", StatusCode::OK),
		_ => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
	};

	let response = HealthResponse {
		status,
		version: env!("CARGO_PKG_VERSION"),
		timestamp: chrono::Utc::now().to_rfc3339(),
		components: HealthComponents {
			store,
			identity_provider,
		},
		policies: state
			.policies
			.registry()
			.names()
			.into_iter()
			.map(str::to_string)
			.collect(),
	};

	(http_status, Json(response))
}

/// Round-trips a probe entry through the store.
async fn check_store(state: &AppState) -> ComponentStatus {
	let key = "health:probe";
	let write = state
		.store
		.put(key, "ok".to_string(), Duration::seconds(5))
		.await;
	let read = state.store.take(key).await;
	match (write, read) {
		(Ok(()), Ok(Some(_))) => ComponentStatus::Ok,
		(write, read) => {
			tracing::error!(
				write_ok = write.is_ok(),
				read_ok = read.is_ok(),
				"store probe failed"
			);
			ComponentStatus::Unavailable
		}
	}
}
