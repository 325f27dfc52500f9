// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Order approval endpoint.
//!
//! Authorization here runs in two tiers. The route gate (`orders:submit`)
//! checks that the caller is allowed to approve orders at all; it never
//! sees the request body. This handler then evaluates `orders:approve`
//! with the actual amount, because whether forty dollars or forty
//! thousand is being approved changes the answer.

use axum::{
	extract::{Extension, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use warden_claims::UserClaimsContext;
use warden_policy::{PolicyContext, PolicyFilterContext};

use crate::{
	api::AppState,
	audit::{AuditEvent, AuditEventType},
};

const APPROVE_POLICY: &str = "orders:approve";

#[derive(Debug, Deserialize)]
pub struct ApproveOrderRequest {
	/// Order total in minor units.
	pub amount: i64,
	pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApproveOrderResponse {
	pub status: &'static str,
	pub amount: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	/// The caller's remaining per-order ceiling, when one was resolved.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub approval_ceiling: Option<i64>,
}

/// POST /api/orders/approve - approve an order if the amount is within
/// the caller's resolved limit.
pub async fn approve_order(
	State(state): State<AppState>,
	claims: Option<Extension<UserClaimsContext>>,
	Json(body): Json<ApproveOrderRequest>,
) -> Response {
	let subject = claims
		.map(|Extension(claims)| claims)
		.unwrap_or_else(UserClaimsContext::anonymous);

	let call = match body.category.as_deref() {
		Some(category) => PolicyContext::amount_in(body.amount, category),
		None => PolicyContext::amount(body.amount),
	};

	let decision = state.policies.evaluate(APPROVE_POLICY, &subject, &call);
	if !decision.allowed {
		let reason = decision.reason.clone();
		tracing::info!(
			user = %subject.user_id,
			amount = body.amount,
			reason = reason.as_deref().unwrap_or("-"),
			"order approval denied"
		);
		AuditEvent::builder(AuditEventType::AccessDenied)
			.user(subject.user_id.clone())
			.detail(json!({
				"policy": APPROVE_POLICY,
				"amount": body.amount,
				"category": body.category,
			}))
			.build()
			.emit();
		return (
			StatusCode::FORBIDDEN,
			Json(json!({
				"error": "forbidden",
				"policy": APPROVE_POLICY,
				"reason": reason,
				"amount": body.amount,
			})),
		)
			.into_response();
	}

	let ceiling = approval_ceiling(decision.filter.as_ref());
	AuditEvent::builder(AuditEventType::AccessGranted)
		.user(subject.user_id.clone())
		.detail(json!({
			"policy": APPROVE_POLICY,
			"amount": body.amount,
			"ceiling": ceiling,
		}))
		.build()
		.emit();

	(
		StatusCode::OK,
		Json(ApproveOrderResponse {
			status: "approved",
			amount: body.amount,
			category: body.category,
			approval_ceiling: ceiling,
		}),
	)
		.into_response()
}

fn approval_ceiling(filter: Option<&PolicyFilterContext>) -> Option<i64> {
	match filter {
		Some(PolicyFilterContext::ApprovalCeiling { limit }) => Some(*limit),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ceiling_comes_from_an_approval_filter() {
		let filter = PolicyFilterContext::ApprovalCeiling { limit: 250_000 };
		assert_eq!(approval_ceiling(Some(&filter)), Some(250_000));
	}

	#[test]
	fn other_filters_carry_no_ceiling() {
		let filter = PolicyFilterContext::PriceWindow {
			min: None,
			max: Some(100),
		};
		assert_eq!(approval_ceiling(Some(&filter)), None);
		assert_eq!(approval_ceiling(None), None);
	}
}
