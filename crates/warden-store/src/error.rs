// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur when talking to a key-value store.
///
/// Absent or expired keys are not errors; read operations report those as
/// `Ok(None)`. An `Err` from a store method means the backend itself
/// misbehaved.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A stored value could not be serialized or deserialized.
	#[error("serialization failed: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The backend could not be reached or rejected the operation.
	#[error("store backend unavailable: {0}")]
	Unavailable(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
