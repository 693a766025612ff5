// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use bastion_server_auth::AuthError;

/// Conflict detail used when a normalized username is already taken.
pub const USERNAME_CONFLICT: &str = "username";

/// Conflict detail used when a credential's external ID is already registered.
pub const CREDENTIAL_CONFLICT: &str = "credential";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// `NotFound` stays distinguishable; every other failure is a storage
/// failure and never reads as bad credentials.
impl From<DbError> for AuthError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(what) => AuthError::NotFound(what),
			DbError::Conflict(what) if what == USERNAME_CONFLICT => AuthError::UsernameTaken,
			DbError::Conflict(what) if what == CREDENTIAL_CONFLICT => AuthError::CredentialExists,
			other => AuthError::Storage(other.to_string()),
		}
	}
}
