// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential authentication: lockout, enumeration resistance, disabled
//! accounts and hash migration.

use bastion_server_audit::AuditAction;
use bastion_server_auth::{AuthError, ClientMetadata, PasswordAlgorithm, PublicError, Role};
use bastion_server_config::HashAlgorithm;
use bastion_server_db::AccountStore;
use serde_json::json;

use super::support::{
	cheap_password_config, secret, test_config, TestManager, MAX_FAILURES, PASSWORD,
};

fn from_ip(ip: &str) -> ClientMetadata {
	ClientMetadata::default().with_ip(ip)
}

#[tokio::test]
async fn successful_login_issues_a_valid_session() {
	let t = TestManager::new();
	let alice = t.account("alice", &[Role::Operator]).await;

	let auth = t
		.manager
		.authenticate("Alice", &secret(PASSWORD), from_ip("192.0.2.1"))
		.await
		.unwrap();

	assert_eq!(auth.account.id, alice.id);
	assert!(auth.account.last_login_at.is_some());
	assert_eq!(auth.session.session.ip_address.as_deref(), Some("192.0.2.1"));

	let (account, session) = t.manager.validate_session(&auth.session.token).await.unwrap();
	assert_eq!(account.id, alice.id);
	assert_eq!(session.id, auth.session.session.id);

	let stored = t.store.get_account(&alice.id).await.unwrap().unwrap();
	assert!(stored.last_login_at.is_some());
	assert_eq!(t.audit.count(AuditAction::LoginSuccess), 1);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() {
	let t = TestManager::new();
	t.account("bob", &[]).await;

	let wrong = t
		.manager
		.authenticate("bob", &secret("not the password"), ClientMetadata::default())
		.await
		.unwrap_err();
	let unknown = t
		.manager
		.authenticate("nobody", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap_err();

	assert!(matches!(wrong, AuthError::InvalidCredentials));
	assert!(matches!(unknown, AuthError::InvalidCredentials));
	assert_eq!(wrong.public(), PublicError::Unauthenticated);
	assert_eq!(wrong.public(), unknown.public());
	assert_eq!(t.audit.count(AuditAction::LoginFail), 2);
}

#[tokio::test]
async fn lockout_after_threshold_refuses_even_the_right_password() {
	let t = TestManager::new();
	let carol = t.account("carol", &[]).await;

	for _ in 0..MAX_FAILURES {
		let err = t
			.manager
			.authenticate("carol", &secret("wrong password"), from_ip("198.51.100.9"))
			.await
			.unwrap_err();
		assert!(matches!(err, AuthError::InvalidCredentials));
	}

	let err = t
		.manager
		.authenticate("carol", &secret(PASSWORD), from_ip("198.51.100.9"))
		.await
		.unwrap_err();
	let AuthError::RateLimited { retry_after } = err else {
		panic!("expected rate limiting, got {err:?}");
	};
	assert!(retry_after.as_secs() <= 60);
	assert!(matches!(
		AuthError::RateLimited { retry_after }.public(),
		PublicError::RateLimited { retry_after_secs } if retry_after_secs >= 1
	));

	let lockouts: Vec<_> = t
		.audit
		.entries()
		.into_iter()
		.filter(|e| e.action == AuditAction::LoginLockout)
		.collect();
	assert_eq!(lockouts.len(), 1);
	assert_eq!(lockouts[0].target_id, Some(carol.id));
	assert_eq!(lockouts[0].metadata["failures"], json!(MAX_FAILURES));
}

#[tokio::test]
async fn locked_identity_fails_fast_and_stays_locked() {
	let t = TestManager::new();
	t.account("dave", &[]).await;

	for _ in 0..MAX_FAILURES {
		let _ = t
			.manager
			.authenticate("dave", &secret("wrong password"), ClientMetadata::default())
			.await;
	}
	for _ in 0..3 {
		assert!(matches!(
			t.manager
				.authenticate("dave", &secret("wrong password"), ClientMetadata::default())
				.await,
			Err(AuthError::RateLimited { .. })
		));
	}
	assert_eq!(t.audit.count(AuditAction::LoginLockout), 1);
}

#[tokio::test]
async fn lockout_is_per_origin() {
	let t = TestManager::new();
	t.account("erin", &[]).await;

	for _ in 0..MAX_FAILURES {
		let _ = t
			.manager
			.authenticate("erin", &secret("wrong password"), from_ip("203.0.113.5"))
			.await;
	}

	assert!(t
		.manager
		.authenticate("erin", &secret(PASSWORD), from_ip("203.0.113.6"))
		.await
		.is_ok());
}

#[tokio::test]
async fn success_clears_recorded_failures() {
	let t = TestManager::new();
	t.account("frank", &[]).await;

	for _ in 0..MAX_FAILURES - 1 {
		let _ = t
			.manager
			.authenticate("frank", &secret("wrong password"), ClientMetadata::default())
			.await;
	}
	t.manager
		.authenticate("frank", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();
	for _ in 0..MAX_FAILURES - 1 {
		let _ = t
			.manager
			.authenticate("frank", &secret("wrong password"), ClientMetadata::default())
			.await;
	}

	assert!(t
		.manager
		.authenticate("frank", &secret(PASSWORD), ClientMetadata::default())
		.await
		.is_ok());
}

#[tokio::test]
async fn disabled_account_never_authenticates() {
	let t = TestManager::new();
	t.admin("root").await;
	let gina = t.account("gina", &[Role::Viewer]).await;
	t.manager.set_disabled(None, &gina.id, true).await.unwrap();

	let err = t
		.manager
		.authenticate("gina", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap_err();
	assert!(matches!(err, AuthError::AccountDisabled));
	assert_eq!(err.public(), PublicError::Unauthenticated);
}

#[tokio::test]
async fn old_hashes_verify_and_migrate_after_a_policy_upgrade() {
	let mut old = test_config();
	old.password.algorithm = HashAlgorithm::Argon2i;
	let before = TestManager::with_config(old);
	let hank = before.account("hank", &[]).await;
	assert_eq!(hank.password_algorithm, PasswordAlgorithm::Argon2i);

	let mut upgraded = test_config();
	upgraded.password = bastion_server_config::PasswordConfig {
		algorithm: HashAlgorithm::Argon2id,
		iterations: 2,
		..cheap_password_config()
	};
	let after = TestManager::with_store(upgraded, before.store.clone());

	after
		.manager
		.authenticate("hank", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();

	let stored = after.store.get_account(&hank.id).await.unwrap().unwrap();
	assert_eq!(stored.password_algorithm, PasswordAlgorithm::Argon2id);
	assert_ne!(stored.password_hash, hank.password_hash);
	assert!(!after
		.manager
		.policy()
		.needs_rehash(&stored.password_hash, stored.password_algorithm));

	let success = after
		.audit
		.entries()
		.into_iter()
		.find(|e| e.action == AuditAction::LoginSuccess)
		.unwrap();
	assert_eq!(success.metadata["algorithm_migrated"], json!(true));

	// The migrated hash keeps working.
	assert!(after
		.manager
		.authenticate("hank", &secret(PASSWORD), ClientMetadata::default())
		.await
		.is_ok());
}

#[tokio::test]
async fn hashing_the_same_secret_twice_salts_differently() {
	let t = TestManager::new();
	let a = t.manager.hash_password(&secret(PASSWORD)).await.unwrap();
	let b = t.manager.hash_password(&secret(PASSWORD)).await.unwrap();

	assert_ne!(a.hash, b.hash);
	assert!(t.manager.verify_password(&secret(PASSWORD), &a).await.unwrap());
	assert!(t.manager.verify_password(&secret(PASSWORD), &b).await.unwrap());
	assert!(!t.manager.verify_password(&secret("something else"), &a).await.unwrap());
}

#[tokio::test]
async fn short_and_long_passwords_are_rejected_before_hashing() {
	let t = TestManager::new();
	assert!(matches!(
		t.manager.hash_password(&secret("short")).await,
		Err(AuthError::PasswordTooShort { min: 8 })
	));
	assert!(matches!(
		t.manager.hash_password(&secret(&"x".repeat(65))).await,
		Err(AuthError::PasswordTooLong { max: 64 })
	));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_lock_exactly_once() {
	let t = TestManager::new();
	t.account("ivan", &[]).await;

	let attempts = (0..12).map(|_| {
		let manager = t.manager.clone();
		tokio::spawn(async move {
			manager
				.authenticate("ivan", &secret("wrong password"), ClientMetadata::default())
				.await
		})
	});
	let results = futures::future::join_all(attempts).await;

	for result in results {
		let err = result.unwrap().unwrap_err();
		assert!(matches!(
			err,
			AuthError::InvalidCredentials | AuthError::RateLimited { .. }
		));
	}
	assert_eq!(t.audit.count(AuditAction::LoginLockout), 1);
}
