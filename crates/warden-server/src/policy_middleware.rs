// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Route-level policy gate.
//!
//! [`RequirePolicy`] is a Tower layer naming the policy a route requires.
//! On each request it reads the caller's [`UserClaimsContext`] from the
//! request extensions (inserted by the session middleware), builds an HTTP
//! call context from the request line, and evaluates the named policy
//! through the shared [`PolicyEvaluator`].
//!
//! A denial short-circuits with a structured 403 carrying the policy name,
//! the denial reason, and the request line. An allow forwards the request,
//! first inserting any [`PolicyFilterContext`] the policy returned into the
//! extensions so the handler can narrow its results without re-deriving
//! authorization logic.
//!
//! Requests with no claims context evaluate as the anonymous subject.
//! There is no early 401 here: policies decide, and the hybrid policies
//! guarding authenticated surfaces deny anonymous by construction.

use std::{
	future::Future,
	pin::Pin,
	sync::Arc,
	task::{Context, Poll},
};

use axum::{
	body::Body,
	http::{Request, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use pin_project_lite::pin_project;
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use warden_claims::UserClaimsContext;
use warden_policy::{PolicyContext, PolicyEvaluator};

use crate::audit::{AuditEvent, AuditEventType};

/// Structured body of a policy denial. Everything here is safe to show;
/// policies keep internal state out of their reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDenial {
	/// Always `"forbidden"`.
	pub error: String,
	/// The policy that denied the request.
	pub policy: String,
	/// The policy's stated reason, when it gave one.
	pub reason: Option<String>,
	pub method: String,
	pub path: String,
}

/// Route layer requiring a named policy to allow the request.
#[derive(Clone)]
pub struct RequirePolicy {
	policy: String,
	evaluator: Arc<PolicyEvaluator>,
}

impl RequirePolicy {
	pub fn new(policy: impl Into<String>, evaluator: Arc<PolicyEvaluator>) -> Self {
		Self {
			policy: policy.into(),
			evaluator,
		}
	}
}

impl<S> Layer<S> for RequirePolicy {
	type Service = RequirePolicyService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RequirePolicyService {
			inner,
			policy: self.policy.clone(),
			evaluator: Arc::clone(&self.evaluator),
		}
	}
}

/// Service wrapper for [`RequirePolicy`].
#[derive(Clone)]
pub struct RequirePolicyService<S> {
	inner: S,
	policy: String,
	evaluator: Arc<PolicyEvaluator>,
}

impl<S> Service<Request<Body>> for RequirePolicyService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send,
{
	type Response = Response;
	type Error = S::Error;
	type Future = RequirePolicyFuture<S::Future>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, mut req: Request<Body>) -> Self::Future {
		let subject = req
			.extensions()
			.get::<UserClaimsContext>()
			.cloned()
			.unwrap_or_else(UserClaimsContext::anonymous);

		let method = req.method().to_string();
		let path = req.uri().path().to_string();
		let call = PolicyContext::http(method.clone(), path.clone());

		let decision = self.evaluator.evaluate(&self.policy, &subject, &call);

		if !decision.allowed {
			tracing::info!(
				policy = %self.policy,
				user = %subject.user_id,
				method = %method,
				path = %path,
				reason = decision.reason.as_deref().unwrap_or("-"),
				"policy denied request"
			);
			AuditEvent::builder(AuditEventType::AccessDenied)
				.user(subject.user_id.clone())
				.detail(serde_json::json!({
					"policy": self.policy,
					"method": method,
					"path": path,
				}))
				.build()
				.emit();

			return RequirePolicyFuture::Rejected {
				resp: Some(denial_response(&self.policy, decision.reason, method, path)),
			};
		}

		tracing::debug!(
			policy = %self.policy,
			user = %subject.user_id,
			filtered = decision.filter.is_some(),
			"policy allowed request"
		);

		if let Some(filter) = decision.filter {
			req.extensions_mut().insert(filter);
		}

		RequirePolicyFuture::Inner {
			fut: self.inner.call(req),
		}
	}
}

pin_project! {
	/// Future for [`RequirePolicyService`].
	#[project = RequirePolicyFutureProj]
	pub enum RequirePolicyFuture<F> {
		Inner { #[pin] fut: F },
		Rejected { resp: Option<Response> },
	}
}

impl<F, E> Future for RequirePolicyFuture<F>
where
	F: Future<Output = Result<Response, E>>,
{
	type Output = Result<Response, E>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match self.project() {
			RequirePolicyFutureProj::Inner { fut } => fut.poll(cx),
			RequirePolicyFutureProj::Rejected { resp } => {
				Poll::Ready(Ok(resp.take().expect("polled after completion")))
			}
		}
	}
}

fn denial_response(policy: &str, reason: Option<String>, method: String, path: String) -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(PolicyDenial {
			error: "forbidden".to_string(),
			policy: policy.to_string(),
			reason,
			method,
			path,
		}),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{extract::Extension, routing::get, Router};
	use proptest::prelude::*;
	use tower::ServiceExt;
	use warden_policy::{
		PermissionOrRole, PolicyConfig, PolicyConfigResolver, PolicyFilterContext, PolicyRegistry,
		PriceWindowPolicy,
	};

	fn evaluator_with_view_policy() -> Arc<PolicyEvaluator> {
		let mut registry = PolicyRegistry::new();
		registry.register(Arc::new(PermissionOrRole::new(
			"profile:view",
			"profile:view",
			["admin", "manager", "buyer"],
		)));
		Arc::new(PolicyEvaluator::new(registry))
	}

	fn evaluator_with_price_policy(max_price: i64) -> Arc<PolicyEvaluator> {
		let resolver = Arc::new(PolicyConfigResolver::new(PolicyConfig {
			max_price: Some(max_price),
			min_price: Some(0),
			..PolicyConfig::default()
		}));
		let mut registry = PolicyRegistry::new();
		registry.register(Arc::new(PriceWindowPolicy::new("artwork:view", resolver)));
		Arc::new(PolicyEvaluator::new(registry))
	}

	async fn dummy_handler() -> &'static str {
		"ok"
	}

	async fn read_json(resp: Response) -> serde_json::Value {
		let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn allows_subject_with_matching_role() {
		let app = Router::new()
			.route("/", get(dummy_handler))
			.layer(RequirePolicy::new("profile:view", evaluator_with_view_policy()));

		let mut req = Request::get("/").body(Body::empty()).unwrap();
		req.extensions_mut()
			.insert(UserClaimsContext::new("user-1").with_role("buyer"));

		let resp = app.oneshot(req).await.unwrap();
		assert_eq!(resp.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn allows_subject_with_matching_permission() {
		let app = Router::new()
			.route("/", get(dummy_handler))
			.layer(RequirePolicy::new("profile:view", evaluator_with_view_policy()));

		let mut req = Request::get("/").body(Body::empty()).unwrap();
		req.extensions_mut()
			.insert(UserClaimsContext::new("user-2").with_permission("profile:view"));

		let resp = app.oneshot(req).await.unwrap();
		assert_eq!(resp.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn denies_anonymous_with_structured_body() {
		let app = Router::new()
			.route("/", get(dummy_handler))
			.layer(RequirePolicy::new("profile:view", evaluator_with_view_policy()));

		let req = Request::get("/").body(Body::empty()).unwrap();
		let resp = app.oneshot(req).await.unwrap();
		assert_eq!(resp.status(), StatusCode::FORBIDDEN);

		let body = read_json(resp).await;
		assert_eq!(body["error"], "forbidden");
		assert_eq!(body["policy"], "profile:view");
		assert_eq!(body["method"], "GET");
		assert_eq!(body["path"], "/");
		assert!(body["reason"].as_str().unwrap().contains("profile:view"));
	}

	#[tokio::test]
	async fn denies_against_unregistered_policy() {
		let app = Router::new()
			.route("/", get(dummy_handler))
			.layer(RequirePolicy::new("nonexistent", evaluator_with_view_policy()));

		let mut req = Request::get("/").body(Body::empty()).unwrap();
		req.extensions_mut()
			.insert(UserClaimsContext::new("user-1").with_role("admin"));

		let resp = app.oneshot(req).await.unwrap();
		assert_eq!(resp.status(), StatusCode::FORBIDDEN);

		let body = read_json(resp).await;
		assert_eq!(body["policy"], "nonexistent");
	}

	#[tokio::test]
	async fn inserts_filter_context_for_downstream_handlers() {
		async fn filter_probe(filter: Option<Extension<PolicyFilterContext>>) -> Response {
			match filter {
				Some(Extension(PolicyFilterContext::PriceWindow { min, max })) => {
					Json(serde_json::json!({"min": min, "max": max})).into_response()
				}
				_ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
			}
		}

		let app = Router::new()
			.route("/", get(filter_probe))
			.layer(RequirePolicy::new("artwork:view", evaluator_with_price_policy(5_000_000)));

		let mut req = Request::get("/").body(Body::empty()).unwrap();
		req.extensions_mut().insert(UserClaimsContext::new("user-1"));

		let resp = app.oneshot(req).await.unwrap();
		assert_eq!(resp.status(), StatusCode::OK);

		let body = read_json(resp).await;
		assert_eq!(body["min"], 0);
		assert_eq!(body["max"], 5_000_000);
	}

	mod property_tests {
		use super::*;

		proptest! {
			/// The same subject against the same policy always produces the
			/// same decision.
			#[test]
			fn decisions_are_deterministic(
				roles in proptest::collection::vec("[a-z]{3,10}", 0..4),
				has_permission in any::<bool>(),
			) {
				let evaluator = evaluator_with_view_policy();
				let mut subject = UserClaimsContext::new("prop-user");
				for role in &roles {
					subject = subject.with_role(role.as_str());
				}
				if has_permission {
					subject = subject.with_permission("profile:view");
				}
				let call = PolicyContext::http("GET", "/api/me");

				let first = evaluator.evaluate("profile:view", &subject, &call);
				let second = evaluator.evaluate("profile:view", &subject, &call);
				prop_assert_eq!(first.allowed, second.allowed);
				prop_assert_eq!(first.reason, second.reason);
			}
		}
	}
}
