// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logins that overlap a password reset. The store is paused partway
//! through the login while the reset runs to completion.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bastion_server_audit::{AuditAction, AuditFilterConfig, AuditLog, AuditSink, MemoryAuditSink};
use bastion_server_auth::{
	Account, AccountId, AuthError, ClientMetadata, CredentialHandle, CredentialId, HashedPassword,
	Role,
};
use bastion_server_config::{HashAlgorithm, PasswordConfig, ServerConfig};
use bastion_server_db::{AccountStore, DbError, MemoryAccountStore};
use bastion_server_manager::AuthManager;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::support::{cheap_password_config, secret, test_config, TestManager, PASSWORD};

const REPLACEMENT: &str = "replacement secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PausePoint {
	RecordLogin,
	PasswordSwap,
}

/// Delegates to a memory store, stopping once at `point` until resumed.
struct PausingStore {
	inner: Arc<MemoryAccountStore>,
	point: PausePoint,
	armed: AtomicBool,
	reached: Notify,
	resume: Notify,
}

impl PausingStore {
	fn new(inner: Arc<MemoryAccountStore>, point: PausePoint) -> Self {
		Self {
			inner,
			point,
			armed: AtomicBool::new(true),
			reached: Notify::new(),
			resume: Notify::new(),
		}
	}

	async fn pause(&self, point: PausePoint) {
		if point == self.point && self.armed.swap(false, Ordering::SeqCst) {
			self.reached.notify_one();
			self.resume.notified().await;
		}
	}
}

#[async_trait]
impl AccountStore for PausingStore {
	async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, DbError> {
		self.inner.get_account(id).await
	}

	async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
		self.inner.get_account_by_username(username).await
	}

	async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
		self.inner.list_accounts().await
	}

	async fn create_account(&self, account: &Account) -> Result<(), DbError> {
		self.inner.create_account(account).await
	}

	async fn update_username(&self, id: &AccountId, username: &str) -> Result<(), DbError> {
		self.inner.update_username(id, username).await
	}

	async fn update_password(
		&self,
		id: &AccountId,
		password: &HashedPassword,
	) -> Result<(), DbError> {
		self.inner.update_password(id, password).await
	}

	async fn replace_password(
		&self,
		id: &AccountId,
		expected_hash: &str,
		password: &HashedPassword,
	) -> Result<bool, DbError> {
		self.pause(PausePoint::PasswordSwap).await;
		self.inner.replace_password(id, expected_hash, password).await
	}

	async fn set_disabled_at(
		&self,
		id: &AccountId,
		disabled_at: Option<DateTime<Utc>>,
	) -> Result<(), DbError> {
		self.inner.set_disabled_at(id, disabled_at).await
	}

	async fn record_login(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), DbError> {
		self.pause(PausePoint::RecordLogin).await;
		self.inner.record_login(id, at).await
	}

	async fn delete_account(&self, id: &AccountId) -> Result<(), DbError> {
		self.inner.delete_account(id).await
	}

	async fn assign_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.inner.assign_role(id, role).await
	}

	async fn remove_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.inner.remove_role(id, role).await
	}

	async fn set_roles(&self, id: &AccountId, roles: &BTreeSet<Role>) -> Result<(), DbError> {
		self.inner.set_roles(id, roles).await
	}

	async fn count_enabled_with_role(
		&self,
		role: Role,
		exclude: Option<&AccountId>,
	) -> Result<u64, DbError> {
		self.inner.count_enabled_with_role(role, exclude).await
	}

	async fn count_with_role(&self, role: Role) -> Result<u64, DbError> {
		self.inner.count_with_role(role).await
	}

	async fn add_credential(&self, credential: &CredentialHandle) -> Result<(), DbError> {
		self.inner.add_credential(credential).await
	}

	async fn list_credentials(&self, id: &AccountId) -> Result<Vec<CredentialHandle>, DbError> {
		self.inner.list_credentials(id).await
	}

	async fn delete_credential(
		&self,
		id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, DbError> {
		self.inner.delete_credential(id, credential_id).await
	}

	async fn delete_credentials_for_account(&self, id: &AccountId) -> Result<u64, DbError> {
		self.inner.delete_credentials_for_account(id).await
	}
}

fn paused_manager(
	store: Arc<PausingStore>,
	config: &ServerConfig,
) -> (Arc<AuthManager>, Arc<MemoryAuditSink>) {
	let audit = Arc::new(MemoryAuditSink::default());
	let log = AuditLog::new(
		AuditFilterConfig::all(),
		vec![audit.clone() as Arc<dyn AuditSink>],
	);
	let manager = AuthManager::new(store as Arc<dyn AccountStore>, config, log).unwrap();
	(Arc::new(manager), audit)
}

/// Start a login, wait until it reaches the store's pause point, run a
/// reset, then let the login finish.
async fn login_across_reset(
	manager: &Arc<AuthManager>,
	store: &PausingStore,
	username: &'static str,
	account_id: AccountId,
) -> Result<bastion_server_manager::Authenticated, AuthError> {
	let login = tokio::spawn({
		let manager = Arc::clone(manager);
		async move {
			let password = secret(PASSWORD);
			manager
				.authenticate(username, &password, ClientMetadata::default())
				.await
		}
	});

	store.reached.notified().await;
	manager
		.reset_password(None, &account_id, &secret(REPLACEMENT))
		.await
		.unwrap();
	store.resume.notify_one();

	login.await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_overlapping_a_reset_gets_no_session() {
	let inner = Arc::new(MemoryAccountStore::new());
	let store = Arc::new(PausingStore::new(inner, PausePoint::RecordLogin));
	let (manager, audit) = paused_manager(store.clone(), &test_config());
	let xena = manager
		.create_account(None, "xena", &secret(PASSWORD), Vec::<Role>::new())
		.await
		.unwrap();

	let result = login_across_reset(&manager, &store, "xena", xena.id).await;

	assert!(matches!(result, Err(AuthError::InvalidCredentials)), "{result:?}");
	assert!(manager.list_sessions(&xena.id).is_empty());
	assert_eq!(audit.count(AuditAction::LoginSuccess), 0);

	assert!(manager
		.authenticate("xena", &secret(REPLACEMENT), ClientMetadata::default())
		.await
		.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rehash_never_overwrites_a_concurrent_reset() {
	let mut old = test_config();
	old.password.algorithm = HashAlgorithm::Argon2i;
	let before = TestManager::with_config(old);
	let yuri = before.account("yuri", &[]).await;

	let mut upgraded = test_config();
	upgraded.password = PasswordConfig {
		algorithm: HashAlgorithm::Argon2id,
		iterations: 2,
		..cheap_password_config()
	};
	let store = Arc::new(PausingStore::new(
		before.store.clone(),
		PausePoint::PasswordSwap,
	));
	let (manager, _audit) = paused_manager(store.clone(), &upgraded);

	let result = login_across_reset(&manager, &store, "yuri", yuri.id).await;

	assert!(matches!(result, Err(AuthError::InvalidCredentials)), "{result:?}");
	assert!(manager.list_sessions(&yuri.id).is_empty());

	// The reset's hash survived the interrupted rehash.
	assert!(matches!(
		manager
			.authenticate("yuri", &secret(PASSWORD), ClientMetadata::default())
			.await,
		Err(AuthError::InvalidCredentials)
	));
	assert!(manager
		.authenticate("yuri", &secret(REPLACEMENT), ClientMetadata::default())
		.await
		.is_ok());
}
