// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory session store.
//!
//! Sessions are keyed by the SHA-256 of their bearer token in a sharded
//! [`DashMap`]. Revocation writes the session's revocation fields under the
//! shard lock, so any `validate` that starts after `revoke` returns sees it.
//! Revoked sessions stay in the map until their expiry passes, which keeps
//! "revoked" distinguishable from "not found" in logs.
//!
//! State is process-local and lost on restart; clients re-authenticate.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use bastion_common_secret::SecretString;
use bastion_server_auth::{
	generate_session_token, hash_token, AccountId, AuthError, ClientMetadata, RevocationReason,
	Session, SessionId,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use tokio::task::JoinHandle;

/// What [`SessionStore::issue`] hands back. The tokens exist in plaintext
/// only here; the store keeps their hashes.
#[derive(Debug)]
pub struct IssuedSession {
	pub session: Session,
	pub token: SecretString,
	pub csrf_token: SecretString,
}

#[derive(Debug, Clone)]
struct SessionRecord {
	session: Session,
	csrf_hash: String,
}

#[derive(Default)]
pub struct SessionStore {
	sessions: DashMap<String, SessionRecord>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn issue(&self, account_id: AccountId, ttl: Duration, metadata: ClientMetadata) -> IssuedSession {
		self.issue_at(account_id, ttl, metadata, Utc::now())
	}

	#[tracing::instrument(skip(self, metadata), fields(account_id = %account_id))]
	pub fn issue_at(
		&self,
		account_id: AccountId,
		ttl: Duration,
		metadata: ClientMetadata,
		now: DateTime<Utc>,
	) -> IssuedSession {
		let session = Session::new_at(account_id, ttl, metadata, now);
		let token = generate_session_token();
		let csrf_token = generate_session_token();

		self.sessions.insert(
			hash_token(token.expose()),
			SessionRecord {
				session: session.clone(),
				csrf_hash: hash_token(csrf_token.expose()),
			},
		);

		tracing::debug!(session_id = %session.id, expires_at = %session.expires_at, "session issued");
		IssuedSession {
			session,
			token,
			csrf_token,
		}
	}

	pub fn validate(&self, token: &SecretString) -> Result<Session, AuthError> {
		self.validate_at(token, Utc::now())
	}

	/// The session behind `token`, if it is active at `now`.
	pub fn validate_at(&self, token: &SecretString, now: DateTime<Utc>) -> Result<Session, AuthError> {
		let record = self
			.sessions
			.get(&hash_token(token.expose()))
			.ok_or(AuthError::SessionNotFound)?;
		record.session.check_at(now)?;
		Ok(record.session.clone())
	}

	/// Check a presented CSRF token against the session it was issued with.
	pub fn verify_csrf(&self, token: &SecretString, csrf_token: &SecretString) -> Result<(), AuthError> {
		self.verify_csrf_at(token, csrf_token, Utc::now())
	}

	pub fn verify_csrf_at(
		&self,
		token: &SecretString,
		csrf_token: &SecretString,
		now: DateTime<Utc>,
	) -> Result<(), AuthError> {
		let record = self
			.sessions
			.get(&hash_token(token.expose()))
			.ok_or(AuthError::SessionNotFound)?;
		record.session.check_at(now)?;

		let presented = hash_token(csrf_token.expose());
		if bool::from(presented.as_bytes().ct_eq(record.csrf_hash.as_bytes())) {
			Ok(())
		} else {
			Err(AuthError::CsrfMismatch)
		}
	}

	/// Revoke one of the account's sessions, or all of them when
	/// `session_id` is `None`. Returns how many were newly revoked; unknown
	/// or already-revoked sessions are not an error.
	#[tracing::instrument(skip(self), fields(account_id = %account_id))]
	pub fn revoke(
		&self,
		account_id: &AccountId,
		session_id: Option<&SessionId>,
		reason: RevocationReason,
	) -> usize {
		self.revoke_matching(account_id, reason, |s| {
			session_id.map_or(true, |id| s.id == *id)
		})
	}

	/// Revoke every session of the account except `keep`.
	#[tracing::instrument(skip(self), fields(account_id = %account_id, keep = %keep))]
	pub fn revoke_all_except(
		&self,
		account_id: &AccountId,
		keep: &SessionId,
		reason: RevocationReason,
	) -> usize {
		self.revoke_matching(account_id, reason, |s| s.id != *keep)
	}

	/// Revoke the session behind a presented token. Returns the session
	/// (revoked now or earlier), or `None` if the token is unknown.
	pub fn revoke_token(&self, token: &SecretString, reason: RevocationReason) -> Option<Session> {
		let mut record = self.sessions.get_mut(&hash_token(token.expose()))?;
		if record.session.revoke_at(reason, Utc::now()) {
			tracing::debug!(session_id = %record.session.id, reason = %reason, "session revoked");
		}
		Some(record.session.clone())
	}

	fn revoke_matching(
		&self,
		account_id: &AccountId,
		reason: RevocationReason,
		matches: impl Fn(&Session) -> bool,
	) -> usize {
		let now = Utc::now();
		let mut revoked = 0;
		for mut record in self.sessions.iter_mut() {
			let session = &mut record.session;
			if session.account_id == *account_id && matches(session) && session.revoke_at(reason, now) {
				revoked += 1;
			}
		}
		if revoked > 0 {
			tracing::debug!(revoked, reason = %reason, "sessions revoked");
		}
		revoked
	}

	/// Active sessions of the account, oldest first.
	pub fn list_for_account(&self, account_id: &AccountId) -> Vec<Session> {
		let now = Utc::now();
		let mut sessions: Vec<Session> = self
			.sessions
			.iter()
			.filter(|r| r.session.account_id == *account_id && r.session.is_active_at(now))
			.map(|r| r.session.clone())
			.collect();
		sessions.sort_by_key(|s| s.created_at);
		sessions
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(Utc::now())
	}

	/// Physically remove sessions whose expiry has passed, revoked or not.
	pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
		let before = self.sessions.len();
		self.sessions.retain(|_, r| now < r.session.expires_at);
		let purged = before.saturating_sub(self.sessions.len());
		if purged > 0 {
			tracing::debug!(purged, "purged expired sessions");
		}
		purged
	}

	/// Purge on a fixed interval until the handle is aborted.
	pub fn spawn_cleanup(self: &Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
		let store = Arc::clone(self);
		tokio::spawn(async move {
			let mut interval_timer = tokio::time::interval(interval.max(StdDuration::from_millis(1)));
			loop {
				interval_timer.tick().await;
				store.purge_expired();
			}
		})
	}
}
