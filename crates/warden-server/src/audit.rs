// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit events for authentication and authorization.
//!
//! Security-relevant facts are recorded as structured [`AuditEvent`]s and
//! emitted through `tracing` under the `audit` target, so an operator can
//! route them separately from application logs with an ordinary filter
//! (`audit=info`). There is no sink pipeline here; the log stream is the
//! audit stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of events recorded in the audit stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Authentication events
	/// A user completed login and received a session.
	Login,
	/// A login attempt failed before a session existed.
	LoginFailed,
	/// A user logged out.
	Logout,

	// Session lifecycle events
	/// A session record was created.
	SessionCreated,
	/// A session was reissued under a fresh id.
	SessionRotated,
	/// A session was deleted.
	SessionRevoked,
	/// A session's client fingerprint stopped matching.
	SessionCompromised,

	// Access control events
	/// A policy allowed a protected operation.
	AccessGranted,
	/// A policy denied a protected operation.
	AccessDenied,

	// Token handoff events
	/// A one-time handoff code was issued.
	HandoffIssued,
	/// A one-time handoff code was redeemed.
	HandoffRedeemed,
}

impl std::fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			AuditEventType::Login => "login",
			AuditEventType::LoginFailed => "login_failed",
			AuditEventType::Logout => "logout",
			AuditEventType::SessionCreated => "session_created",
			AuditEventType::SessionRotated => "session_rotated",
			AuditEventType::SessionRevoked => "session_revoked",
			AuditEventType::SessionCompromised => "session_compromised",
			AuditEventType::AccessGranted => "access_granted",
			AuditEventType::AccessDenied => "access_denied",
			AuditEventType::HandoffIssued => "handoff_issued",
			AuditEventType::HandoffRedeemed => "handoff_redeemed",
		};
		write!(f, "{s}")
	}
}

/// One security-relevant fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
	/// Unique id for this event.
	pub id: Uuid,
	/// When the event occurred.
	pub at: DateTime<Utc>,
	/// What happened.
	pub event_type: AuditEventType,
	/// The subject involved, when known.
	pub user_id: Option<String>,
	/// The session involved, when one exists.
	pub session_id: Option<String>,
	/// Event-specific details. Never token material.
	pub detail: serde_json::Value,
}

impl AuditEvent {
	pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
		AuditEventBuilder::new(event_type)
	}

	/// Emits the event as a structured log record.
	///
	/// Session ids are bearer secrets; only a short prefix is emitted,
	/// enough to correlate events for one session without reproducing a
	/// usable credential in the logs.
	pub fn emit(&self) {
		tracing::info!(
			target: "audit",
			event_id = %self.id,
			event = %self.event_type,
			user = self.user_id.as_deref().unwrap_or("-"),
			session = self.session_id.as_deref().map(session_prefix).unwrap_or("-"),
			detail = %self.detail,
			"audit event"
		);
	}
}

/// First 12 characters of a session id, for log correlation.
fn session_prefix(session_id: &str) -> &str {
	let end = session_id
		.char_indices()
		.nth(12)
		.map(|(idx, _)| idx)
		.unwrap_or(session_id.len());
	&session_id[..end]
}

/// Fluent construction for [`AuditEvent`].
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
	event_type: AuditEventType,
	user_id: Option<String>,
	session_id: Option<String>,
	detail: serde_json::Value,
}

impl AuditEventBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			user_id: None,
			session_id: None,
			detail: serde_json::Value::Null,
		}
	}

	pub fn user(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn session(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn detail(mut self, detail: serde_json::Value) -> Self {
		self.detail = detail;
		self
	}

	pub fn build(self) -> AuditEvent {
		AuditEvent {
			id: Uuid::new_v4(),
			at: Utc::now(),
			event_type: self.event_type,
			user_id: self.user_id,
			session_id: self.session_id,
			detail: self.detail,
		}
	}
}
