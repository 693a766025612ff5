// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential and session authentication.
//!
//! The login path is:
//!
//! 1. Consult the rate limiter. A locked identity fails here, before any
//!    hashing work and before the account store is touched.
//! 2. Look the account up and verify the password off the async runtime.
//!    Unknown usernames verify against a dummy hash.
//! 3. Record the outcome in the limiter, audit it, and on success issue a
//!    session.

use bastion_common_secret::SecretString;
use bastion_server_audit::AuditAction;
use bastion_server_auth::{
	authorize, require_role, Account, AccountId, AuthError, ClientMetadata, RevocationReason, Role,
	Session, SessionId,
};
use bastion_server_ratelimit::{Decision, RateLimitKey};
use bastion_server_session::IssuedSession;
use chrono::Utc;
use serde_json::json;

use crate::manager::AuthManager;

/// A successful login: the account as of this login and its new session.
#[derive(Debug)]
pub struct Authenticated {
	pub account: Account,
	pub session: IssuedSession,
}

impl AuthManager {
	/// Authenticate a username and password. The client's IP, when known,
	/// becomes part of the rate-limit key.
	#[tracing::instrument(skip(self, password, client), fields(username = %username))]
	pub async fn authenticate(
		&self,
		username: &str,
		password: &SecretString,
		client: ClientMetadata,
	) -> Result<Authenticated, AuthError> {
		let key = RateLimitKey::new(username, client.ip_address.as_deref());

		if let Decision::Locked(retry_after) = self.limiter.check(&key) {
			tracing::info!(retry_after_secs = retry_after.as_secs(), "login refused while locked");
			self.record_audit(
				AuditAction::LoginFail,
				None,
				None,
				json!({ "username": username, "reason": "rate_limited" }),
			)
			.await;
			return Err(AuthError::RateLimited { retry_after });
		}

		let Some(account) = self.store.get_account_by_username(username).await? else {
			self.verify_dummy(password).await?;
			return Err(self.reject(&key, None, username, "unknown_user").await);
		};

		let stored = Self::stored_password(&account);
		if !self.verify_password(password, &stored).await? {
			return Err(self.reject(&key, Some(account.id), username, "bad_password").await);
		}

		if !account.is_enabled() {
			self.reject(&key, Some(account.id), username, "disabled").await;
			return Err(AuthError::AccountDisabled);
		}

		self.limiter.record_success(&key);

		let mut current_hash = stored.hash.clone();
		let mut migrated = false;
		if self.policy.needs_rehash(&stored.hash, stored.algorithm) {
			if let Some(rehashed) = self.migrate_password(&account, password, &stored.hash).await {
				current_hash = rehashed;
				migrated = true;
			}
		}

		self.store.record_login(&account.id, Utc::now()).await?;
		let session = self.sessions.issue(account.id, self.session_ttl, client);

		// A reset, change, disable or delete that landed after the verify
		// above revoked every session that existed then. This one was not
		// among them, so check again now that it is visible.
		let account = match self.confirm_login(&account, &current_hash).await {
			Ok(latest) => latest,
			Err((reason, err)) => {
				self.sessions
					.revoke(&account.id, Some(&session.session.id), reason);
				tracing::warn!(account_id = %account.id, reason = reason.as_str(), "login raced an account change");
				self.record_audit(
					AuditAction::LoginFail,
					None,
					Some(account.id),
					json!({ "username": username, "reason": reason.as_str() }),
				)
				.await;
				return Err(err);
			}
		};

		self.record_audit(
			AuditAction::LoginSuccess,
			Some(account.id),
			Some(account.id),
			json!({
				"session_id": session.session.id.to_string(),
				"algorithm_migrated": migrated,
			}),
		)
		.await;
		tracing::info!(account_id = %account.id, session_id = %session.session.id, "login succeeded");

		Ok(Authenticated { account, session })
	}

	/// Count a failed attempt, auditing the lockout if this one caused it.
	async fn reject(
		&self,
		key: &RateLimitKey,
		account_id: Option<AccountId>,
		username: &str,
		reason: &'static str,
	) -> AuthError {
		let outcome = self.limiter.record_failure(key);

		if outcome.newly_locked {
			self.record_audit(
				AuditAction::LoginLockout,
				None,
				account_id,
				json!({
					"username": username,
					"failures": outcome.failures,
					"lockout_secs": outcome.locked_for.map(|d| d.as_secs()),
				}),
			)
			.await;
		}

		tracing::warn!(reason, failures = outcome.failures, "login failed");
		self.record_audit(
			AuditAction::LoginFail,
			None,
			account_id,
			json!({ "username": username, "reason": reason }),
		)
		.await;

		AuthError::InvalidCredentials
	}

	/// Re-read the account after issuing a session. Fails with the reason
	/// the session must be revoked if the account was disabled, deleted or
	/// given a different password in the meantime.
	async fn confirm_login(
		&self,
		account: &Account,
		verified_hash: &str,
	) -> Result<Account, (RevocationReason, AuthError)> {
		let latest = match self.store.get_account(&account.id).await {
			Ok(latest) => latest,
			Err(e) => return Err((RevocationReason::Administrative, e.into())),
		};
		match latest {
			None => Err((RevocationReason::AccountDeleted, AuthError::InvalidCredentials)),
			Some(latest) if !latest.is_enabled() => {
				Err((RevocationReason::AccountDisabled, AuthError::AccountDisabled))
			}
			Some(latest) if latest.password_hash != verified_hash => {
				Err((RevocationReason::PasswordReset, AuthError::InvalidCredentials))
			}
			Some(latest) => Ok(latest),
		}
	}

	/// Re-hash under the current policy after a successful login and return
	/// the new hash. The swap only happens if the stored hash is still the
	/// one that was verified; otherwise, or on failure, the stored hash is
	/// left alone.
	async fn migrate_password(
		&self,
		account: &Account,
		password: &SecretString,
		verified_hash: &str,
	) -> Option<String> {
		let hashed = match self.hash_password(password).await {
			Ok(hashed) => hashed,
			Err(e) => {
				tracing::warn!(account_id = %account.id, error = %e, "password rehash failed");
				return None;
			}
		};
		match self
			.store
			.replace_password(&account.id, verified_hash, &hashed)
			.await
		{
			Ok(true) => {
				tracing::info!(
					account_id = %account.id,
					from = %account.password_algorithm,
					to = %self.policy.algorithm(),
					"password hash migrated"
				);
				Some(hashed.hash)
			}
			Ok(false) => {
				tracing::info!(account_id = %account.id, "password changed during login, rehash skipped");
				None
			}
			Err(e) => {
				tracing::warn!(account_id = %account.id, error = %e, "password hash migration failed");
				None
			}
		}
	}

	/// Resolve a bearer token to its session and a currently enabled account.
	pub async fn validate_session(&self, token: &SecretString) -> Result<(Account, Session), AuthError> {
		let session = self.sessions.validate(token).map_err(|e| {
			tracing::debug!(code = e.code(), "session rejected");
			e
		})?;

		let account = self
			.store
			.get_account(&session.account_id)
			.await?
			.ok_or(AuthError::SessionNotFound)?;
		if !account.is_enabled() {
			return Err(AuthError::AccountDisabled);
		}

		Ok((account, session))
	}

	/// Check a CSRF token against the session behind `token`.
	pub fn verify_csrf(&self, token: &SecretString, csrf_token: &SecretString) -> Result<(), AuthError> {
		self.sessions.verify_csrf(token, csrf_token)
	}

	pub fn authorize(&self, account: &Account, required: Role) -> bool {
		authorize(account, required)
	}

	/// Like [`AuthManager::authorize`], auditing denials.
	pub async fn require_role(&self, account: &Account, required: Role) -> Result<(), AuthError> {
		let result = require_role(account, required);
		if let Err(ref e) = result {
			self.record_audit(
				AuditAction::AccessDenied,
				Some(account.id),
				None,
				json!({ "required_role": required.as_str(), "code": e.code() }),
			)
			.await;
		}
		result
	}

	/// Issue a session for an enabled account without a password check,
	/// for flows that authenticated some other way.
	pub async fn issue_session(
		&self,
		account_id: &AccountId,
		client: ClientMetadata,
	) -> Result<IssuedSession, AuthError> {
		let account = self.get_account(account_id).await?;
		if !account.is_enabled() {
			return Err(AuthError::AccountDisabled);
		}

		let issued = self.sessions.issue(account.id, self.session_ttl, client);
		self.record_audit(
			AuditAction::SessionIssue,
			Some(account.id),
			Some(account.id),
			json!({ "session_id": issued.session.id.to_string() }),
		)
		.await;
		Ok(issued)
	}

	/// Revoke one session of an account, or all of them. Idempotent; returns
	/// how many sessions this call revoked.
	pub async fn revoke_session(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		session_id: Option<&SessionId>,
	) -> usize {
		let reason = if actor_id == Some(*account_id) {
			RevocationReason::Logout
		} else {
			RevocationReason::Administrative
		};
		let revoked = self.sessions.revoke(account_id, session_id, reason);
		if revoked > 0 {
			self.record_audit(
				AuditAction::SessionRevoke,
				actor_id,
				Some(*account_id),
				json!({
					"session_id": session_id.map(|id| id.to_string()),
					"revoked": revoked,
					"reason": reason.as_str(),
				}),
			)
			.await;
		}
		revoked
	}

	/// Sign out every other device of the account.
	pub async fn revoke_other_sessions(&self, account_id: &AccountId, keep: &SessionId) -> usize {
		let revoked = self
			.sessions
			.revoke_all_except(account_id, keep, RevocationReason::Logout);
		if revoked > 0 {
			self.record_audit(
				AuditAction::SessionRevoke,
				Some(*account_id),
				Some(*account_id),
				json!({ "kept_session_id": keep.to_string(), "revoked": revoked }),
			)
			.await;
		}
		revoked
	}

	/// End the session behind `token`. Unknown tokens are ignored.
	pub async fn logout(&self, token: &SecretString) -> Option<Session> {
		let session = self.sessions.revoke_token(token, RevocationReason::Logout)?;
		self.record_audit(
			AuditAction::Logout,
			Some(session.account_id),
			Some(session.account_id),
			json!({ "session_id": session.id.to_string() }),
		)
		.await;
		Some(session)
	}

	pub fn list_sessions(&self, account_id: &AccountId) -> Vec<Session> {
		self.sessions.list_for_account(account_id)
	}
}
