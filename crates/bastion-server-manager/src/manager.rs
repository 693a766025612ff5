// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration as StdDuration;

use bastion_common_secret::SecretString;
use bastion_server_audit::{AuditAction, AuditEntry, AuditLog};
use bastion_server_auth::{Account, AccountId, AuthError, HashedPassword, PasswordPolicy};
use bastion_server_config::{ServerConfig, MAX_PERIOD_SECS};
use bastion_server_db::AccountStore;
use bastion_server_ratelimit::RateLimiter;
use bastion_server_session::SessionStore;
use chrono::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

/// The authentication and authorization core.
///
/// One instance is built at startup and shared (behind an `Arc`) by every
/// request handler. It owns the session store and the rate limiter; account
/// state is always read fresh from the [`AccountStore`].
pub struct AuthManager {
	pub(crate) store: Arc<dyn AccountStore>,
	pub(crate) policy: Arc<PasswordPolicy>,
	pub(crate) limiter: Arc<RateLimiter>,
	pub(crate) sessions: Arc<SessionStore>,
	pub(crate) audit: AuditLog,
	pub(crate) session_ttl: Duration,
	session_cleanup: StdDuration,
	limiter_cleanup: StdDuration,
	/// Serializes every check-then-mutate on the administrator set.
	pub(crate) admin_lock: Mutex<()>,
	dummy_hash: OnceCell<HashedPassword>,
}

impl AuthManager {
	pub fn new(
		store: Arc<dyn AccountStore>,
		config: &ServerConfig,
		audit: AuditLog,
	) -> Result<Self, AuthError> {
		let policy = PasswordPolicy::from_config(&config.password)?;
		Ok(Self {
			store,
			policy: Arc::new(policy),
			limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
			sessions: Arc::new(SessionStore::new()),
			audit,
			session_ttl: Duration::seconds(config.session.ttl_secs.min(MAX_PERIOD_SECS) as i64),
			session_cleanup: StdDuration::from_secs(config.session.cleanup_interval_secs),
			limiter_cleanup: StdDuration::from_secs(config.rate_limit.cleanup_interval_secs),
			admin_lock: Mutex::new(()),
			dummy_hash: OnceCell::new(),
		})
	}

	pub fn store(&self) -> &Arc<dyn AccountStore> {
		&self.store
	}

	pub fn policy(&self) -> &PasswordPolicy {
		&self.policy
	}

	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	pub fn sessions(&self) -> &Arc<SessionStore> {
		&self.sessions
	}

	pub fn audit_log(&self) -> &AuditLog {
		&self.audit
	}

	/// Start the periodic session purge and limiter prune.
	pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
		vec![
			self.sessions.spawn_cleanup(self.session_cleanup),
			self.limiter.spawn_cleanup(self.limiter_cleanup),
		]
	}

	// =========================================================================
	// Password hashing
	// =========================================================================

	/// Hash a secret under the current policy on the blocking pool.
	pub async fn hash_password(&self, password: &SecretString) -> Result<HashedPassword, AuthError> {
		self.policy.check_length(password.expose())?;
		let policy = Arc::clone(&self.policy);
		let password = password.clone();
		tokio::task::spawn_blocking(move || policy.hash(&password))
			.await
			.map_err(|e| AuthError::Hashing(format!("hashing task failed: {e}")))?
	}

	/// Check a secret against a stored hash on the blocking pool.
	pub async fn verify_password(
		&self,
		password: &SecretString,
		stored: &HashedPassword,
	) -> Result<bool, AuthError> {
		let policy = Arc::clone(&self.policy);
		let password = password.clone();
		let stored = stored.clone();
		tokio::task::spawn_blocking(move || policy.verify(&password, &stored.hash, stored.algorithm))
			.await
			.map_err(|e| AuthError::Hashing(format!("verification task failed: {e}")))
	}

	/// Spend one verification's worth of work when there is no account to
	/// verify against, so unknown usernames take as long as wrong passwords.
	pub(crate) async fn verify_dummy(&self, password: &SecretString) -> Result<(), AuthError> {
		let dummy = self
			.dummy_hash
			.get_or_try_init(|| async {
				let filler = SecretString::from("x".repeat(self.policy.min_length().max(1)));
				self.hash_password(&filler).await
			})
			.await?;
		self.verify_password(password, dummy).await?;
		Ok(())
	}

	pub(crate) fn stored_password(account: &Account) -> HashedPassword {
		HashedPassword {
			hash: account.password_hash.clone(),
			algorithm: account.password_algorithm,
		}
	}

	// =========================================================================
	// Audit
	// =========================================================================

	/// Append to the audit log. A write failure is logged and swallowed: the
	/// operation that produced the entry has already happened.
	pub async fn record_audit(
		&self,
		action: AuditAction,
		actor_id: Option<AccountId>,
		target_id: Option<AccountId>,
		metadata: serde_json::Value,
	) -> Option<Arc<AuditEntry>> {
		match self.audit.record(action, actor_id, target_id, metadata).await {
			Ok(entry) => entry,
			Err(e) => {
				tracing::warn!(action = %action, error = %e, "audit write failed");
				None
			}
		}
	}

	// =========================================================================
	// Lookups
	// =========================================================================

	pub async fn get_account(&self, id: &AccountId) -> Result<Account, AuthError> {
		self.store
			.get_account(id)
			.await?
			.ok_or_else(|| AuthError::NotFound("account".to_string()))
	}

	pub async fn list_accounts(&self) -> Result<Vec<Account>, AuthError> {
		Ok(self.store.list_accounts().await?)
	}
}
