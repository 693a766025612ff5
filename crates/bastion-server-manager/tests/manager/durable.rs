// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The manager over SQLite, and what happens when storage goes away.

use std::sync::Arc;

use bastion_server_audit::{
	AuditAction, AuditFilterConfig, AuditLog, AuditSink, MemoryAuditSink, SqliteAuditSink,
};
use bastion_server_auth::{AuthError, ClientMetadata, PublicError, Role};
use bastion_server_db::testing::create_test_pool;
use bastion_server_db::{AccountRepository, AccountStore, MemoryAccountStore};
use bastion_server_manager::AuthManager;
use bastion_server_ratelimit::RateLimitKey;

use super::support::{secret, test_config, PASSWORD};

#[tokio::test]
async fn sqlite_backed_manager_end_to_end() {
	let pool = create_test_pool().await;
	let sink = Arc::new(SqliteAuditSink::new(pool.clone(), AuditFilterConfig::all()));
	let manager = AuthManager::new(
		Arc::new(AccountRepository::new(pool.clone())),
		&test_config(),
		AuditLog::new(AuditFilterConfig::all(), vec![sink.clone() as Arc<dyn AuditSink>]),
	)
	.unwrap();

	let root = manager.bootstrap("root", &secret(PASSWORD)).await.unwrap();
	let ops = manager
		.create_account(Some(root.id), "ops", &secret(PASSWORD), [Role::Operator])
		.await
		.unwrap();
	let auth = manager
		.authenticate("OPS", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();
	assert_eq!(auth.account.id, ops.id);

	assert!(matches!(
		manager.set_disabled(Some(root.id), &root.id, true).await,
		Err(AuthError::LastAdministrator)
	));
	manager.set_disabled(Some(root.id), &ops.id, true).await.unwrap();
	assert!(manager.validate_session(&auth.session.token).await.is_err());

	let trail = sink.recent(10).await.unwrap();
	assert_eq!(
		trail.iter().map(|e| e.action).collect::<Vec<_>>(),
		vec![
			AuditAction::Bootstrap,
			AuditAction::UserCreate,
			AuditAction::LoginSuccess,
			AuditAction::UserDisable,
		]
	);
	assert_eq!(trail[1].actor_id, Some(root.id));
}

#[tokio::test]
async fn storage_failure_is_never_bad_credentials() {
	let pool = create_test_pool().await;
	let repo = Arc::new(AccountRepository::new(pool.clone()));
	let manager = AuthManager::new(repo, &test_config(), AuditLog::disabled()).unwrap();
	manager
		.create_account(None, "paul", &secret(PASSWORD), Vec::<Role>::new())
		.await
		.unwrap();

	pool.close().await;

	let err = manager
		.authenticate("paul", &secret("wrong password"), ClientMetadata::default())
		.await
		.unwrap_err();
	assert!(matches!(err, AuthError::Storage(_)), "{err:?}");
	assert!(err.is_internal());
	assert_eq!(err.public(), PublicError::Internal);
	assert_eq!(
		manager
			.limiter()
			.failure_count(&RateLimitKey::new("paul", None)),
		0
	);
}

#[tokio::test]
async fn audit_failure_does_not_undo_the_operation() {
	let audit_pool = create_test_pool().await;
	let broken = Arc::new(SqliteAuditSink::new(audit_pool.clone(), AuditFilterConfig::all()));
	let memory = Arc::new(MemoryAuditSink::default());
	audit_pool.close().await;

	let store = Arc::new(MemoryAccountStore::new());
	let manager = AuthManager::new(
		store.clone(),
		&test_config(),
		AuditLog::new(
			AuditFilterConfig::all(),
			vec![
				broken as Arc<dyn AuditSink>,
				memory.clone() as Arc<dyn AuditSink>,
			],
		),
	)
	.unwrap();

	let x = manager
		.create_account(None, "quentin", &secret(PASSWORD), Vec::<Role>::new())
		.await
		.unwrap();
	let auth = manager
		.authenticate("quentin", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();
	manager
		.reset_password(None, &x.id, &secret("replacement secret"))
		.await
		.unwrap();

	assert!(manager.validate_session(&auth.session.token).await.is_err());
	assert!(store.get_account(&x.id).await.unwrap().is_some());
	// Healthy sinks still receive every entry.
	assert_eq!(memory.count(AuditAction::PasswordReset), 1);
}
