// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account lifecycle, role checks, credentials and the audit trail they
//! leave.

use bastion_server_audit::AuditAction;
use bastion_server_auth::{AccountId, AuthError, ClientMetadata, PublicError, Role};
use serde_json::json;

use super::support::{secret, TestManager, PASSWORD};

#[tokio::test]
async fn usernames_are_unique_by_normalized_form() {
	let t = TestManager::new();
	t.account("Alice", &[]).await;

	let err = t
		.manager
		.create_account(None, "  ALICE ", &secret(PASSWORD), Vec::<Role>::new())
		.await
		.unwrap_err();
	assert!(matches!(err, AuthError::UsernameTaken));
	assert_eq!(
		err.public(),
		PublicError::Conflict {
			code: "auth.username_taken"
		}
	);
}

#[tokio::test]
async fn blank_usernames_are_rejected() {
	let t = TestManager::new();
	assert!(matches!(
		t.manager.create_account(None, "   ", &secret(PASSWORD), Vec::<Role>::new()).await,
		Err(AuthError::UsernameRequired)
	));
}

#[tokio::test]
async fn rename_checks_collisions() {
	let t = TestManager::new();
	let admin = t.admin("root").await;
	let a = t.account("anna", &[]).await;
	t.account("ben", &[]).await;

	assert!(matches!(
		t.manager.update_username(Some(admin.id), &a.id, "Ben").await,
		Err(AuthError::UsernameTaken)
	));
	let renamed = t
		.manager
		.update_username(Some(admin.id), &a.id, "Annabel")
		.await
		.unwrap();
	assert_eq!(renamed.username, "Annabel");
	assert!(t
		.manager
		.authenticate("annabel", &secret(PASSWORD), ClientMetadata::default())
		.await
		.is_ok());

	let update = t
		.audit
		.entries()
		.into_iter()
		.find(|e| e.action == AuditAction::UserUpdate)
		.unwrap();
	assert_eq!(update.actor_id, Some(admin.id));
	assert_eq!(update.metadata["previous_username"], json!("anna"));
}

#[tokio::test]
async fn missing_accounts_are_not_found_not_internal() {
	let t = TestManager::new();
	let ghost = AccountId::generate();

	for err in [
		t.manager.set_disabled(None, &ghost, true).await.unwrap_err(),
		t.manager.delete_account(None, &ghost).await.unwrap_err(),
		t.manager
			.reset_password(None, &ghost, &secret(PASSWORD))
			.await
			.unwrap_err(),
		t.manager
			.issue_session(&ghost, ClientMetadata::default())
			.await
			.unwrap_err(),
	] {
		assert!(matches!(err, AuthError::NotFound(_)), "{err:?}");
		assert_eq!(err.public(), PublicError::NotFound);
	}
}

#[tokio::test]
async fn role_checks_and_denials() {
	let t = TestManager::new();
	let viewer = t.account("viewer", &[Role::Viewer]).await;
	let op = t.account("operator", &[Role::Operator]).await;
	let admin = t.admin("admin").await;

	assert!(t.manager.authorize(&admin, Role::Operator));
	assert!(t.manager.authorize(&op, Role::Viewer));
	assert!(!t.manager.authorize(&viewer, Role::Operator));

	let err = t
		.manager
		.require_role(&viewer, Role::Administrator)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		AuthError::Forbidden {
			required: Role::Administrator
		}
	));
	t.manager.require_role(&op, Role::Operator).await.unwrap();

	let denied = t
		.audit
		.entries()
		.into_iter()
		.filter(|e| e.action == AuditAction::AccessDenied)
		.collect::<Vec<_>>();
	assert_eq!(denied.len(), 1);
	assert_eq!(denied[0].actor_id, Some(viewer.id));
	assert_eq!(denied[0].metadata["required_role"], json!("administrator"));
}

#[tokio::test]
async fn role_changes_are_read_fresh_from_the_store() {
	let t = TestManager::new();
	t.admin("root").await;
	let x = t.account("xiu", &[Role::Viewer]).await;
	let auth = t
		.manager
		.authenticate("xiu", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();

	assert!(t.manager.assign_role(None, &x.id, Role::Operator).await.unwrap());
	assert!(!t.manager.assign_role(None, &x.id, Role::Operator).await.unwrap());

	let (account, _) = t.manager.validate_session(&auth.session.token).await.unwrap();
	assert!(t.manager.authorize(&account, Role::Operator));
	assert_eq!(t.audit.count(AuditAction::RoleAssign), 1);
}

#[tokio::test]
async fn credential_records_lifecycle() {
	let t = TestManager::new();
	let x = t.account("kim", &[]).await;

	let key = t
		.manager
		.register_credential(Some(x.id), &x.id, vec![1, 2, 3], vec![9; 32], Some("yubikey".into()))
		.await
		.unwrap();
	assert!(matches!(
		t.manager
			.register_credential(Some(x.id), &x.id, vec![1, 2, 3], vec![8; 32], None)
			.await,
		Err(AuthError::CredentialExists)
	));

	let listed = t.manager.list_credentials(&x.id).await.unwrap();
	assert_eq!(listed.len(), 1);
	assert_eq!(listed[0].label.as_deref(), Some("yubikey"));

	let other = t.account("lee", &[]).await;
	assert!(!t
		.manager
		.delete_credential(None, &other.id, &key.id)
		.await
		.unwrap());
	assert!(t.manager.delete_credential(None, &x.id, &key.id).await.unwrap());
	assert!(t.manager.list_credentials(&x.id).await.unwrap().is_empty());

	assert_eq!(t.audit.count(AuditAction::CredentialRegister), 1);
	assert_eq!(t.audit.count(AuditAction::CredentialDelete), 1);
}

#[tokio::test]
async fn deleting_an_account_cascades() {
	let t = TestManager::new();
	t.admin("root").await;
	let x = t.account("mo", &[Role::Operator]).await;
	t.manager
		.register_credential(None, &x.id, vec![7], vec![7], None)
		.await
		.unwrap();
	let auth = t
		.manager
		.authenticate("mo", &secret(PASSWORD), ClientMetadata::default())
		.await
		.unwrap();

	t.manager.delete_account(None, &x.id).await.unwrap();

	assert!(t.manager.validate_session(&auth.session.token).await.is_err());
	assert!(t.manager.list_credentials(&x.id).await.unwrap().is_empty());
	assert!(matches!(
		t.manager.get_account(&x.id).await,
		Err(AuthError::NotFound(_))
	));
	// The name is free again.
	t.account("mo", &[]).await;
}

#[tokio::test]
async fn audit_trail_is_ordered_and_never_holds_secrets() {
	let t = TestManager::new();
	let root = t
		.manager
		.bootstrap("root", &secret("bootstrap secret"))
		.await
		.unwrap();
	let x = t.account("nia", &[]).await;
	t.manager
		.reset_password(Some(root.id), &x.id, &secret("fresh secret value"))
		.await
		.unwrap();
	t.manager
		.authenticate("nia", &secret("fresh secret value"), ClientMetadata::default())
		.await
		.unwrap();

	let entries = t.audit.entries();
	assert_eq!(
		entries.iter().map(|e| e.action).collect::<Vec<_>>(),
		vec![
			AuditAction::Bootstrap,
			AuditAction::UserCreate,
			AuditAction::PasswordReset,
			AuditAction::LoginSuccess,
		]
	);
	assert!(entries.windows(2).all(|w| w[0].sequence < w[1].sequence));

	let dumped = serde_json::to_string(&entries.iter().map(|e| &**e).collect::<Vec<_>>()).unwrap();
	assert!(!dumped.contains("bootstrap secret"));
	assert!(!dumped.contains("fresh secret value"));
	assert!(!dumped.contains("$argon2"));
}
