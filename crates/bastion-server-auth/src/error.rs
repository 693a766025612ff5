// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and authorization error types.
//!
//! [`AuthError`] keeps the precise failure for logs and audit metadata.
//! Anything leaving the process goes through [`AuthError::public`], which
//! folds every unauthenticated kind into one outcome.

use std::time::Duration;

use thiserror::Error;

use crate::types::Role;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Authentication Errors
	// =========================================================================
	/// Unknown username or wrong password.
	#[error("invalid credentials")]
	InvalidCredentials,

	/// The account exists but is disabled.
	#[error("account disabled")]
	AccountDisabled,

	/// Too many recent failures for this identity.
	#[error("too many failed attempts, retry after {}s", .retry_after.as_secs())]
	RateLimited { retry_after: Duration },

	#[error("session expired")]
	SessionExpired,

	#[error("session revoked")]
	SessionRevoked,

	#[error("session not found")]
	SessionNotFound,

	/// CSRF token did not match the session.
	#[error("csrf token mismatch")]
	CsrfMismatch,

	// =========================================================================
	// Password Policy Errors
	// =========================================================================
	#[error("password must be at least {min} characters")]
	PasswordTooShort { min: usize },

	#[error("password must be at most {max} characters")]
	PasswordTooLong { max: usize },

	// =========================================================================
	// Authorization Errors
	// =========================================================================
	/// Authenticated, but lacking the role.
	#[error("forbidden: requires {required}")]
	Forbidden { required: Role },

	/// The mutation would leave no enabled administrator.
	#[error("cannot remove the last enabled administrator")]
	LastAdministrator,

	/// Bootstrap is only possible while no administrator exists.
	#[error("an administrator already exists")]
	BootstrapClosed,

	// =========================================================================
	// Account Errors
	// =========================================================================
	#[error("username already taken")]
	UsernameTaken,

	#[error("username is required")]
	UsernameRequired,

	/// The authenticator credential is already registered.
	#[error("credential already registered")]
	CredentialExists,

	#[error("{0} not found")]
	NotFound(String),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	/// Account store failure. Never reinterpreted as a missing user.
	#[error("storage error: {0}")]
	Storage(String),

	#[error("password hashing error: {0}")]
	Hashing(String),
}

/// What a caller outside the process is allowed to learn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublicError {
	#[error("unauthenticated")]
	Unauthenticated,

	/// Only the wait is exposed, never the failure count.
	#[error("too many attempts, retry after {retry_after_secs}s")]
	RateLimited { retry_after_secs: u64 },

	#[error("forbidden")]
	Forbidden,

	#[error("not found")]
	NotFound,

	#[error("conflict: {code}")]
	Conflict { code: &'static str },

	#[error("rejected: {code}")]
	Rejected { code: &'static str },

	#[error("internal error")]
	Internal,
}

impl PublicError {
	pub fn status_code(&self) -> u16 {
		match self {
			PublicError::Unauthenticated => 401,
			PublicError::Forbidden => 403,
			PublicError::NotFound => 404,
			PublicError::Conflict { .. } => 409,
			PublicError::Rejected { .. } => 422,
			PublicError::RateLimited { .. } => 429,
			PublicError::Internal => 500,
		}
	}

	pub fn code(&self) -> &'static str {
		match self {
			PublicError::Unauthenticated => "auth.unauthenticated",
			PublicError::RateLimited { .. } => "auth.rate_limited",
			PublicError::Forbidden => "auth.forbidden",
			PublicError::NotFound => "auth.not_found",
			PublicError::Conflict { code } | PublicError::Rejected { code } => *code,
			PublicError::Internal => "auth.internal",
		}
	}
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Storage(_) | AuthError::Hashing(_))
	}

	/// Kinds that a caller only ever sees as "unauthenticated".
	pub fn is_unauthenticated(&self) -> bool {
		matches!(
			self,
			AuthError::InvalidCredentials
				| AuthError::AccountDisabled
				| AuthError::SessionExpired
				| AuthError::SessionRevoked
				| AuthError::SessionNotFound
		)
	}

	/// Stable machine-readable code for logs and audit metadata.
	pub fn code(&self) -> &'static str {
		match self {
			AuthError::InvalidCredentials => "auth.invalid_credentials",
			AuthError::AccountDisabled => "auth.user_disabled",
			AuthError::RateLimited { .. } => "auth.rate_limited",
			AuthError::SessionExpired => "auth.session_expired",
			AuthError::SessionRevoked => "auth.session_revoked",
			AuthError::SessionNotFound => "auth.session_not_found",
			AuthError::CsrfMismatch => "auth.csrf_mismatch",
			AuthError::PasswordTooShort { .. } => "auth.password_too_short",
			AuthError::PasswordTooLong { .. } => "auth.password_too_long",
			AuthError::Forbidden { .. } => "auth.forbidden",
			AuthError::LastAdministrator => "auth.last_admin",
			AuthError::BootstrapClosed => "auth.bootstrap_closed",
			AuthError::UsernameTaken => "auth.username_taken",
			AuthError::UsernameRequired => "auth.username_required",
			AuthError::CredentialExists => "auth.credential_exists",
			AuthError::NotFound(_) => "auth.not_found",
			AuthError::Storage(_) => "auth.storage",
			AuthError::Hashing(_) => "auth.hashing",
		}
	}

	/// Project onto the outcome a caller is allowed to see.
	pub fn public(&self) -> PublicError {
		match self {
			AuthError::InvalidCredentials
			| AuthError::AccountDisabled
			| AuthError::SessionExpired
			| AuthError::SessionRevoked
			| AuthError::SessionNotFound => PublicError::Unauthenticated,

			AuthError::RateLimited { retry_after } => PublicError::RateLimited {
				retry_after_secs: retry_after_secs(*retry_after),
			},

			AuthError::Forbidden { .. } | AuthError::CsrfMismatch => PublicError::Forbidden,

			AuthError::NotFound(_) => PublicError::NotFound,

			AuthError::LastAdministrator
			| AuthError::UsernameTaken
			| AuthError::CredentialExists
			| AuthError::BootstrapClosed => PublicError::Conflict { code: self.code() },

			AuthError::PasswordTooShort { .. }
			| AuthError::PasswordTooLong { .. }
			| AuthError::UsernameRequired => PublicError::Rejected { code: self.code() },

			AuthError::Storage(_) | AuthError::Hashing(_) => PublicError::Internal,
		}
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		self.public().status_code()
	}
}

// Round up so a client never retries a moment too early.
fn retry_after_secs(retry_after: Duration) -> u64 {
	let secs = retry_after.as_secs();
	if retry_after.subsec_nanos() > 0 {
		secs + 1
	} else {
		secs.max(1)
	}
}
