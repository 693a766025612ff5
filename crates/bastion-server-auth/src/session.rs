// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session records and bearer token generation.
//!
//! # Security Model
//!
//! - Tokens are 32 bytes of cryptographic randomness, hex-encoded
//! - Only the SHA-256 of a token is ever stored or used as a lookup key
//! - Expiry is absolute; a session is never extended after issue
//! - Revocation is terminal and records why it happened
//!
//! # PII Considerations
//!
//! `ip_address` and `user_agent` are kept for the session listing only and
//! are never copied into audit metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bastion_common_secret::SecretString;
use bastion_server_config::MAX_PERIOD_SECS;

use crate::error::AuthError;
use crate::types::{AccountId, SessionId};

/// Number of random bytes in a session or CSRF token.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Why a session stopped being valid before its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
	Logout,
	PasswordReset,
	PasswordChange,
	AccountDisabled,
	AccountDeleted,
	Administrative,
}

impl RevocationReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			RevocationReason::Logout => "logout",
			RevocationReason::PasswordReset => "password_reset",
			RevocationReason::PasswordChange => "password_change",
			RevocationReason::AccountDisabled => "account_disabled",
			RevocationReason::AccountDeleted => "account_deleted",
			RevocationReason::Administrative => "administrative",
		}
	}
}

impl std::fmt::Display for RevocationReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
	Active,
	Expired,
	Revoked,
}

/// Client details captured when a session is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl ClientMetadata {
	pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
		self.ip_address = Some(ip.into());
		self
	}

	pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
		self.user_agent = Some(ua.into());
		self
	}
}

/// A session bound to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
	pub id: SessionId,
	pub account_id: AccountId,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub revoked_at: Option<DateTime<Utc>>,
	pub revocation_reason: Option<RevocationReason>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
}

impl Session {
	pub fn new(account_id: AccountId, ttl: Duration, metadata: ClientMetadata) -> Self {
		Self::new_at(account_id, ttl, metadata, Utc::now())
	}

	pub fn new_at(
		account_id: AccountId,
		ttl: Duration,
		metadata: ClientMetadata,
		now: DateTime<Utc>,
	) -> Self {
		let ttl = ttl.min(Duration::seconds(MAX_PERIOD_SECS as i64));
		Self {
			id: SessionId::generate(),
			account_id,
			created_at: now,
			// Out of range only for absurd negative TTLs; such a session is
			// born expired.
			expires_at: now.checked_add_signed(ttl).unwrap_or(now),
			revoked_at: None,
			revocation_reason: None,
			ip_address: metadata.ip_address,
			user_agent: metadata.user_agent,
		}
	}

	/// Revocation wins over expiry: a revoked session reports `Revoked` even
	/// after its expiry has passed.
	pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
		if self.revoked_at.is_some() {
			SessionStatus::Revoked
		} else if now >= self.expires_at {
			SessionStatus::Expired
		} else {
			SessionStatus::Active
		}
	}

	pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
		self.status_at(now) == SessionStatus::Active
	}

	pub fn check_at(&self, now: DateTime<Utc>) -> Result<(), AuthError> {
		match self.status_at(now) {
			SessionStatus::Active => Ok(()),
			SessionStatus::Expired => Err(AuthError::SessionExpired),
			SessionStatus::Revoked => Err(AuthError::SessionRevoked),
		}
	}

	/// Mark revoked. Returns false if it already was; the first reason sticks.
	pub fn revoke_at(&mut self, reason: RevocationReason, now: DateTime<Utc>) -> bool {
		if self.revoked_at.is_some() {
			return false;
		}
		self.revoked_at = Some(now);
		self.revocation_reason = Some(reason);
		true
	}
}

/// Generates a cryptographically secure random token (64 hex chars).
pub fn generate_session_token() -> SecretString {
	use rand::Rng;
	let bytes: [u8; SESSION_TOKEN_BYTES] = rand::thread_rng().gen();
	SecretString::new(hex::encode(bytes))
}

/// SHA-256 of a presented token, hex-encoded. This is the storage key.
pub fn hash_token(token: &str) -> String {
	hex::encode(Sha256::digest(token.as_bytes()))
}
