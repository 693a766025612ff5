// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session issue, validation and every path that revokes.

use bastion_server_audit::AuditAction;
use bastion_server_auth::{AuthError, ClientMetadata, PublicError, RevocationReason, Role};

use super::support::{secret, TestManager, PASSWORD};

async fn login(t: &TestManager, username: &str) -> bastion_server_manager::Authenticated {
	t.manager
		.authenticate(username, &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap()
}

#[tokio::test]
async fn revoked_session_is_unauthenticated() {
	let t = TestManager::new();
	let x = t.account("xavier", &[]).await;
	let issued = t
		.manager
		.issue_session(&x.id, ClientMetadata::default())
		.await
		.unwrap();

	assert_eq!(
		t.manager
			.revoke_session(Some(x.id), &x.id, Some(&issued.session.id))
			.await,
		1
	);

	let err = t.manager.validate_session(&issued.token).await.unwrap_err();
	assert!(matches!(err, AuthError::SessionRevoked));
	assert_eq!(err.public(), PublicError::Unauthenticated);
	assert_eq!(t.audit.count(AuditAction::SessionIssue), 1);
	assert_eq!(t.audit.count(AuditAction::SessionRevoke), 1);
}

#[tokio::test]
async fn revoking_twice_is_not_an_error() {
	let t = TestManager::new();
	let x = t.account("xena", &[]).await;
	let auth = login(&t, "xena").await;

	t.manager
		.revoke_session(None, &x.id, Some(&auth.session.session.id))
		.await;
	assert_eq!(
		t.manager
			.revoke_session(None, &x.id, Some(&auth.session.session.id))
			.await,
		0
	);
	assert_eq!(t.manager.revoke_session(None, &x.id, None).await, 0);
	assert_eq!(t.audit.count(AuditAction::SessionRevoke), 1);
}

#[tokio::test]
async fn administrative_revocation_records_its_reason() {
	let t = TestManager::new();
	let admin = t.admin("root").await;
	let x = t.account("yusuf", &[]).await;
	let auth = login(&t, "yusuf").await;

	t.manager.revoke_session(Some(admin.id), &x.id, None).await;

	let session = t
		.manager
		.sessions()
		.revoke_token(&auth.session.token, RevocationReason::Logout)
		.unwrap();
	assert_eq!(session.revocation_reason, Some(RevocationReason::Administrative));
}

#[tokio::test]
async fn password_reset_invalidates_every_session() {
	let t = TestManager::new();
	let admin = t.admin("root").await;
	let x = t.account("zoe", &[]).await;
	let first = login(&t, "zoe").await;
	let second = login(&t, "zoe").await;

	t.manager
		.reset_password(Some(admin.id), &x.id, &secret("a brand new secret"))
		.await
		.unwrap();

	for token in [&first.session.token, &second.session.token] {
		assert!(matches!(
			t.manager.validate_session(token).await,
			Err(AuthError::SessionRevoked)
		));
	}
	assert!(t.manager.list_sessions(&x.id).is_empty());
	assert!(t
		.manager
		.authenticate("zoe", &secret("a brand new secret"), ClientMetadata::default())
		.await
		.is_ok());
	assert_eq!(t.audit.count(AuditAction::PasswordReset), 1);
}

#[tokio::test]
async fn password_change_keeps_only_the_current_session() {
	let t = TestManager::new();
	let x = t.account("quinn", &[]).await;
	let current = login(&t, "quinn").await;
	let other = login(&t, "quinn").await;

	t.manager
		.change_password(
			&x.id,
			&current.session.session.id,
			&secret(PASSWORD),
			&secret("another long secret"),
		)
		.await
		.unwrap();

	assert!(t.manager.validate_session(&current.session.token).await.is_ok());
	assert!(t.manager.validate_session(&other.session.token).await.is_err());
	assert_eq!(t.manager.list_sessions(&x.id).len(), 1);
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
	let t = TestManager::new();
	let x = t.account("rosa", &[]).await;
	let current = login(&t, "rosa").await;

	let err = t
		.manager
		.change_password(
			&x.id,
			&current.session.session.id,
			&secret("not my password"),
			&secret("another long secret"),
		)
		.await
		.unwrap_err();
	assert!(matches!(err, AuthError::InvalidCredentials));
	assert!(t.manager.validate_session(&current.session.token).await.is_ok());
	assert_eq!(t.audit.count(AuditAction::PasswordChange), 0);
}

#[tokio::test]
async fn logout_ends_only_that_session() {
	let t = TestManager::new();
	t.account("sam", &[]).await;
	let a = login(&t, "sam").await;
	let b = login(&t, "sam").await;

	let ended = t.manager.logout(&a.session.token).await.unwrap();
	assert_eq!(ended.id, a.session.session.id);
	assert!(t.manager.validate_session(&a.session.token).await.is_err());
	assert!(t.manager.validate_session(&b.session.token).await.is_ok());
	assert!(t.manager.logout(&secret("unknown-token")).await.is_none());
	assert_eq!(t.audit.count(AuditAction::Logout), 1);
}

#[tokio::test]
async fn sign_out_other_devices() {
	let t = TestManager::new();
	let x = t.account("tara", &[]).await;
	let here = login(&t, "tara").await;
	login(&t, "tara").await;
	login(&t, "tara").await;

	assert_eq!(
		t.manager
			.revoke_other_sessions(&x.id, &here.session.session.id)
			.await,
		2
	);
	let listed = t.manager.list_sessions(&x.id);
	assert_eq!(listed.len(), 1);
	assert_eq!(listed[0].id, here.session.session.id);
}

#[tokio::test]
async fn disabling_an_account_ends_its_sessions() {
	let t = TestManager::new();
	t.admin("root").await;
	let x = t.account("uma", &[Role::Operator]).await;
	let auth = login(&t, "uma").await;

	t.manager.set_disabled(None, &x.id, true).await.unwrap();
	assert!(matches!(
		t.manager.validate_session(&auth.session.token).await,
		Err(AuthError::SessionRevoked)
	));

	// Re-enabling does not resurrect revoked sessions.
	t.manager.set_disabled(None, &x.id, false).await.unwrap();
	assert!(t.manager.validate_session(&auth.session.token).await.is_err());
	assert!(matches!(
		t.manager
			.issue_session(&x.id, ClientMetadata::default())
			.await,
		Ok(_)
	));
}

#[tokio::test]
async fn disabled_accounts_cannot_be_issued_sessions() {
	let t = TestManager::new();
	let x = t.account("vic", &[]).await;
	t.manager.set_disabled(None, &x.id, true).await.unwrap();

	assert!(matches!(
		t.manager
			.issue_session(&x.id, ClientMetadata::default())
			.await,
		Err(AuthError::AccountDisabled)
	));
}

#[tokio::test]
async fn csrf_token_is_bound_to_its_session() {
	let t = TestManager::new();
	t.account("wes", &[]).await;
	let a = login(&t, "wes").await;
	let b = login(&t, "wes").await;

	assert!(t
		.manager
		.verify_csrf(&a.session.token, &a.session.csrf_token)
		.is_ok());
	assert!(matches!(
		t.manager.verify_csrf(&a.session.token, &b.session.csrf_token),
		Err(AuthError::CsrfMismatch)
	));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revocation_is_seen_by_validators_that_start_after_it() {
	let t = TestManager::new();
	let x = t.account("will", &[]).await;
	let mut tokens = Vec::new();
	for _ in 0..8 {
		tokens.push(login(&t, "will").await.session.token);
	}

	t.manager.revoke_session(None, &x.id, None).await;

	let checks = tokens.into_iter().map(|token| {
		let manager = t.manager.clone();
		tokio::spawn(async move { manager.validate_session(&token).await.is_err() })
	});
	for rejected in futures::future::join_all(checks).await {
		assert!(rejected.unwrap());
	}
}
