// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The system must always keep at least one enabled administrator.

use std::collections::BTreeSet;

use bastion_server_auth::{AuthError, PublicError, Role};
use bastion_server_db::AccountStore;

use super::support::TestManager;

#[tokio::test]
async fn disabling_the_sole_admin_fails_and_changes_nothing() {
	let t = TestManager::new();
	let root = t.admin("root").await;

	let err = t.manager.set_disabled(None, &root.id, true).await.unwrap_err();
	assert!(matches!(err, AuthError::LastAdministrator));
	assert_eq!(
		err.public(),
		PublicError::Conflict {
			code: "auth.last_admin"
		}
	);

	let stored = t.store.get_account(&root.id).await.unwrap().unwrap();
	assert!(stored.is_enabled());
}

#[tokio::test]
async fn alice_then_bob() {
	let t = TestManager::new();
	let alice = t.admin("alice").await;
	let bob = t.admin("bob").await;

	t.manager.set_disabled(None, &alice.id, true).await.unwrap();
	assert!(matches!(
		t.manager.set_disabled(None, &bob.id, true).await,
		Err(AuthError::LastAdministrator)
	));
	assert!(t.store.get_account(&bob.id).await.unwrap().unwrap().is_enabled());
}

#[tokio::test]
async fn disabled_admins_do_not_count() {
	let t = TestManager::new();
	let a = t.admin("a").await;
	let b = t.admin("b").await;
	t.manager.set_disabled(None, &a.id, true).await.unwrap();

	assert!(matches!(
		t.manager.delete_account(None, &b.id).await,
		Err(AuthError::LastAdministrator)
	));
	assert!(matches!(
		t.manager.revoke_role(None, &b.id, Role::Administrator).await,
		Err(AuthError::LastAdministrator)
	));
	assert!(matches!(
		t.manager.ensure_not_last_administrator(&b.id).await,
		Err(AuthError::LastAdministrator)
	));

	// The disabled one can be removed freely.
	t.manager.ensure_not_last_administrator(&a.id).await.unwrap();
	t.manager.delete_account(None, &a.id).await.unwrap();
}

#[tokio::test]
async fn demotion_through_set_roles_is_guarded() {
	let t = TestManager::new();
	let root = t.admin("root").await;

	let demoted: BTreeSet<Role> = [Role::Operator].into_iter().collect();
	assert!(matches!(
		t.manager.set_roles(None, &root.id, demoted.clone()).await,
		Err(AuthError::LastAdministrator)
	));

	let second = t.admin("second").await;
	let updated = t.manager.set_roles(None, &root.id, demoted).await.unwrap();
	assert!(!updated.is_administrator());
	assert!(updated.has_role(Role::Operator));
	assert!(t
		.manager
		.store()
		.get_account(&second.id)
		.await
		.unwrap()
		.unwrap()
		.is_administrator());
}

#[tokio::test]
async fn non_admin_mutations_are_unguarded() {
	let t = TestManager::new();
	let op = t.account("op", &[Role::Operator]).await;

	// No administrator exists at all, yet non-admin accounts stay mutable.
	t.manager.set_disabled(None, &op.id, true).await.unwrap();
	t.manager.set_disabled(None, &op.id, false).await.unwrap();
	assert!(!t.manager.revoke_role(None, &op.id, Role::Administrator).await.unwrap());
	assert!(t.manager.revoke_role(None, &op.id, Role::Operator).await.unwrap());
	t.manager.delete_account(None, &op.id).await.unwrap();
}

#[tokio::test]
async fn bootstrap_only_once() {
	let t = TestManager::new();
	let first = t
		.manager
		.bootstrap("owner", &super::support::secret("bootstrap secret"))
		.await
		.unwrap();
	assert!(first.is_administrator());

	assert!(matches!(
		t.manager
			.bootstrap("intruder", &super::support::secret("bootstrap secret"))
			.await,
		Err(AuthError::BootstrapClosed)
	));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_disables_of_the_last_two_admins_cannot_both_succeed() {
	for _ in 0..20 {
		let t = TestManager::new();
		let a = t.admin("a").await;
		let b = t.admin("b").await;

		let (ra, rb) = tokio::join!(
			{
				let manager = t.manager.clone();
				tokio::spawn(async move { manager.set_disabled(None, &a.id, true).await })
			},
			{
				let manager = t.manager.clone();
				tokio::spawn(async move { manager.set_disabled(None, &b.id, true).await })
			},
		);
		let outcomes = [ra.unwrap(), rb.unwrap()];

		assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(outcomes
			.iter()
			.any(|r| matches!(r, Err(AuthError::LastAdministrator))));
		assert_eq!(
			t.store
				.count_enabled_with_role(Role::Administrator, None)
				.await
				.unwrap(),
			1
		);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_concurrent_admin_removals_leave_one_admin() {
	let t = TestManager::new();
	let admins = vec![
		t.admin("a1").await,
		t.admin("a2").await,
		t.admin("a3").await,
	];

	let mut handles = Vec::new();
	for (i, admin) in admins.into_iter().enumerate() {
		let manager = t.manager.clone();
		handles.push(tokio::spawn(async move {
			match i % 3 {
				0 => manager.set_disabled(None, &admin.id, true).await.map(|_| ()),
				1 => manager.delete_account(None, &admin.id).await,
				_ => manager
					.revoke_role(None, &admin.id, Role::Administrator)
					.await
					.map(|_| ()),
			}
		}));
	}
	let results = futures::future::join_all(handles).await;

	let failures = results
		.into_iter()
		.map(|r| r.unwrap())
		.filter(|r| matches!(r, Err(AuthError::LastAdministrator)))
		.count();
	assert_eq!(failures, 1);
	assert_eq!(
		t.store
			.count_enabled_with_role(Role::Administrator, None)
			.await
			.unwrap(),
		1
	);
}
