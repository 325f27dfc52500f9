// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden backend-for-frontend server.
//!
//! This crate wires the policy engine and the browser-facing OAuth flow
//! into one HTTP surface: public auth routes that keep provider tokens
//! server-side, and API routes gated by named policies.

pub mod api;
pub mod audit;
pub mod error;
pub mod policy_middleware;
pub mod routes;
pub mod session_middleware;

pub use api::{create_app_state, create_router, AppState};
pub use error::ErrorResponse;
pub use policy_middleware::RequirePolicy;
pub use warden_server_config::ServerConfig;
