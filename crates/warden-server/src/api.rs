// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.
//!
//! All stateful pieces hang off [`AppState`]: one shared [`MemoryStore`]
//! backs the session, login-flow, and handoff managers, and the policy
//! evaluator carries the registry built at startup. The router wires the
//! public auth surface, then the gated API routes, then the session
//! middleware around all of it so claims are attached before any gate
//! runs.

use std::sync::Arc;

use axum::{
	routing::{get, post},
	Router,
};
use chrono::Duration;
use warden_claims::AssertionCache;
use warden_handoff::TokenHandoff;
use warden_oidc::OidcClient;
use warden_pkce::PkceFlowManager;
use warden_policy::{
	ApprovalLimitPolicy, PermissionOrRole, PolicyConfigResolver, PolicyEvaluator, PolicyRegistry,
	PriceWindowPolicy,
};
use warden_server_config::ServerConfig;
use warden_session::SessionManager;
use warden_store::MemoryStore;

use crate::{policy_middleware::RequirePolicy, routes, session_middleware};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
	pub store: Arc<MemoryStore>,
	pub sessions: Arc<SessionManager<MemoryStore>>,
	pub pkce: Arc<PkceFlowManager<MemoryStore>>,
	pub handoff: Arc<TokenHandoff<MemoryStore>>,
	pub assertions: Arc<AssertionCache>,
	pub policies: Arc<PolicyEvaluator>,
	pub resolver: Arc<PolicyConfigResolver>,
	pub oidc: Option<Arc<OidcClient>>,
	pub config: Arc<ServerConfig>,
}

/// Build the application state from configuration.
pub fn create_app_state(config: ServerConfig) -> AppState {
	let store = Arc::new(MemoryStore::new());

	let sessions = Arc::new(SessionManager::with_ttl(
		store.clone(),
		Duration::minutes(config.session.ttl_minutes),
	));
	let pkce = Arc::new(PkceFlowManager::with_ttl(
		store.clone(),
		Duration::minutes(config.pkce.ttl_minutes),
	));
	let handoff = Arc::new(TokenHandoff::with_ttl(
		store.clone(),
		Duration::seconds(config.handoff.ttl_seconds),
	));

	let mut resolver = PolicyConfigResolver::new(config.policy.defaults.clone());
	for (role, role_config) in &config.policy.roles {
		resolver = resolver.with_role_config(role, role_config.clone());
	}
	let resolver = Arc::new(resolver);

	let mut registry = PolicyRegistry::new();
	registry.register(Arc::new(PermissionOrRole::new(
		"profile:view",
		"profile:view",
		["admin", "manager", "buyer"],
	)));
	registry.register(Arc::new(PriceWindowPolicy::new(
		"artwork:view",
		resolver.clone(),
	)));
	registry.register(Arc::new(PermissionOrRole::new(
		"orders:submit",
		"orders:approve",
		["admin", "manager"],
	)));
	registry.register(Arc::new(ApprovalLimitPolicy::new(
		"orders:approve",
		resolver.clone(),
	)));
	let policies = Arc::new(PolicyEvaluator::new(registry));

	let oidc = match &config.oidc {
		Some(oidc_config) => {
			tracing::info!(client_id = %oidc_config.client_id, "identity provider configured");
			Some(Arc::new(OidcClient::new(oidc_config.clone())))
		}
		None => {
			tracing::info!("no identity provider configured, login endpoints will return 501");
			None
		}
	};

	AppState {
		store,
		sessions,
		pkce,
		handoff,
		assertions: Arc::new(AssertionCache::new()),
		policies,
		resolver,
		oidc,
		config: Arc::new(config),
	}
}

/// Build the HTTP router.
pub fn create_router(state: AppState) -> Router {
	let public = Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/auth/login", get(routes::auth::login))
		.route("/auth/callback", get(routes::auth::callback))
		.route("/auth/session", post(routes::auth::create_session))
		.route("/auth/refresh", post(routes::auth::refresh))
		.route("/auth/logout", post(routes::auth::logout));

	let profile = Router::new()
		.route("/api/me", get(routes::me::me))
		.route_layer(RequirePolicy::new("profile:view", state.policies.clone()));

	let artworks = Router::new()
		.route("/api/artworks", get(routes::artworks::list_artworks))
		.route_layer(RequirePolicy::new("artwork:view", state.policies.clone()));

	let orders = Router::new()
		.route("/api/orders/approve", post(routes::orders::approve_order))
		.route_layer(RequirePolicy::new("orders:submit", state.policies.clone()));

	Router::new()
		.merge(public)
		.merge(profile)
		.merge(artworks)
		.merge(orders)
		.layer(axum::middleware::from_fn_with_state(
			state.clone(),
			session_middleware::attach_session,
		))
		.with_state(state)
}
