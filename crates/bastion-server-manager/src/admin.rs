// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account lifecycle and the last-administrator guard.
//!
//! Any mutation that can take an enabled administrator out of the enabled
//! administrator set (disable, delete, demote) runs with `admin_lock` held
//! from the count of remaining administrators until the store write
//! returns. Two such mutations can therefore never both see "one other
//! administrator left" and both proceed. Password hashing always happens
//! before the lock is taken.

use std::collections::BTreeSet;

use bastion_common_secret::SecretString;
use bastion_server_audit::AuditAction;
use bastion_server_auth::{
	drops_administrator, ensure_other_administrators, validate_username, Account, AccountId,
	AdminState, AuthError, RevocationReason, Role, SessionId,
};
use chrono::Utc;
use serde_json::json;

use crate::manager::AuthManager;

fn role_names(roles: &BTreeSet<Role>) -> Vec<&'static str> {
	roles.iter().map(Role::as_str).collect()
}

impl AuthManager {
	/// Fail with `LastAdministrator` if moving `account` to `to` (`None`
	/// for deletion) would leave no enabled administrator. Callers that go
	/// on to mutate must hold `admin_lock`.
	async fn guard_admin_transition(
		&self,
		account: &Account,
		to: Option<AdminState>,
	) -> Result<(), AuthError> {
		if !account.admin_state().transition_is_guarded(to) {
			return Ok(());
		}
		let others = self
			.store
			.count_enabled_with_role(Role::Administrator, Some(&account.id))
			.await?;
		ensure_other_administrators(others).inspect_err(|_| {
			tracing::warn!(account_id = %account.id, "refused to remove the last enabled administrator");
		})
	}

	/// Whether `account_id` could be disabled, demoted or deleted right now
	/// without leaving the system without an enabled administrator.
	pub async fn ensure_not_last_administrator(&self, account_id: &AccountId) -> Result<(), AuthError> {
		let account = self.get_account(account_id).await?;
		self.guard_admin_transition(&account, None).await
	}

	/// Create the first administrator. Only possible while no account holds
	/// the administrator role, enabled or not.
	#[tracing::instrument(skip(self, password), fields(username = %username))]
	pub async fn bootstrap(&self, username: &str, password: &SecretString) -> Result<Account, AuthError> {
		let username = validate_username(username)?;
		let hashed = self.hash_password(password).await?;

		let guard = self.admin_lock.lock().await;
		if self.store.count_with_role(Role::Administrator).await? > 0 {
			return Err(AuthError::BootstrapClosed);
		}
		let account = Account::new(&username, hashed, [Role::Administrator])?;
		self.store.create_account(&account).await?;
		drop(guard);

		tracing::info!(account_id = %account.id, "bootstrap administrator created");
		self.record_audit(
			AuditAction::Bootstrap,
			None,
			Some(account.id),
			json!({ "username": account.username }),
		)
		.await;
		Ok(account)
	}

	#[tracing::instrument(skip(self, password, roles), fields(username = %username))]
	pub async fn create_account(
		&self,
		actor_id: Option<AccountId>,
		username: &str,
		password: &SecretString,
		roles: impl IntoIterator<Item = Role>,
	) -> Result<Account, AuthError> {
		let username = validate_username(username)?;
		let hashed = self.hash_password(password).await?;
		let account = Account::new(&username, hashed, roles)?;
		self.store.create_account(&account).await?;

		self.record_audit(
			AuditAction::UserCreate,
			actor_id,
			Some(account.id),
			json!({ "username": account.username, "roles": role_names(&account.roles) }),
		)
		.await;
		Ok(account)
	}

	pub async fn update_username(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		username: &str,
	) -> Result<Account, AuthError> {
		let username = validate_username(username)?;
		let previous = self.get_account(account_id).await?;
		self.store.update_username(account_id, &username).await?;

		self.record_audit(
			AuditAction::UserUpdate,
			actor_id,
			Some(*account_id),
			json!({ "username": username, "previous_username": previous.username }),
		)
		.await;
		self.get_account(account_id).await
	}

	/// Enable or disable an account. Disabling revokes every session of the
	/// account and is refused for the last enabled administrator. Setting
	/// the state an account already has is a no-op.
	#[tracing::instrument(skip(self), fields(account_id = %account_id))]
	pub async fn set_disabled(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		disabled: bool,
	) -> Result<Account, AuthError> {
		if !disabled {
			let account = self.get_account(account_id).await?;
			if account.is_enabled() {
				return Ok(account);
			}
			self.store.set_disabled_at(account_id, None).await?;
			self.record_audit(AuditAction::UserEnable, actor_id, Some(*account_id), json!({}))
				.await;
			return self.get_account(account_id).await;
		}

		let guard = self.admin_lock.lock().await;
		let account = self.get_account(account_id).await?;
		if !account.is_enabled() {
			return Ok(account);
		}
		self.guard_admin_transition(&account, Some(AdminState::Disabled))
			.await?;
		self.store.set_disabled_at(account_id, Some(Utc::now())).await?;
		drop(guard);

		let revoked = self
			.sessions
			.revoke(account_id, None, RevocationReason::AccountDisabled);
		self.record_audit(
			AuditAction::UserDisable,
			actor_id,
			Some(*account_id),
			json!({ "sessions_revoked": revoked }),
		)
		.await;
		self.get_account(account_id).await
	}

	/// Delete an account with its roles and credential handles, and revoke
	/// its sessions. Refused for the last enabled administrator.
	#[tracing::instrument(skip(self), fields(account_id = %account_id))]
	pub async fn delete_account(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
	) -> Result<(), AuthError> {
		let guard = self.admin_lock.lock().await;
		let account = self.get_account(account_id).await?;
		self.guard_admin_transition(&account, None).await?;
		self.store.delete_account(account_id).await?;
		drop(guard);

		let revoked = self
			.sessions
			.revoke(account_id, None, RevocationReason::AccountDeleted);
		self.record_audit(
			AuditAction::UserDelete,
			actor_id,
			Some(*account_id),
			json!({ "username": account.username, "sessions_revoked": revoked }),
		)
		.await;
		Ok(())
	}

	/// Administrative password reset. Every session of the account is
	/// revoked.
	#[tracing::instrument(skip(self, password), fields(account_id = %account_id))]
	pub async fn reset_password(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		password: &SecretString,
	) -> Result<(), AuthError> {
		let hashed = self.hash_password(password).await?;
		self.store.update_password(account_id, &hashed).await?;

		let revoked = self
			.sessions
			.revoke(account_id, None, RevocationReason::PasswordReset);
		self.record_audit(
			AuditAction::PasswordReset,
			actor_id,
			Some(*account_id),
			json!({ "sessions_revoked": revoked }),
		)
		.await;
		Ok(())
	}

	/// Self-service password change. The current password must verify;
	/// every session except `current_session` is revoked.
	#[tracing::instrument(skip(self, current, new), fields(account_id = %account_id))]
	pub async fn change_password(
		&self,
		account_id: &AccountId,
		current_session: &SessionId,
		current: &SecretString,
		new: &SecretString,
	) -> Result<(), AuthError> {
		let account = self.get_account(account_id).await?;
		if !self
			.verify_password(current, &Self::stored_password(&account))
			.await?
		{
			return Err(AuthError::InvalidCredentials);
		}

		let hashed = self.hash_password(new).await?;
		// Refuse if another change or reset replaced the hash just verified.
		if !self
			.store
			.replace_password(account_id, &account.password_hash, &hashed)
			.await?
		{
			return Err(AuthError::InvalidCredentials);
		}

		let revoked = self.sessions.revoke_all_except(
			account_id,
			current_session,
			RevocationReason::PasswordChange,
		);
		self.record_audit(
			AuditAction::PasswordChange,
			Some(*account_id),
			Some(*account_id),
			json!({ "sessions_revoked": revoked }),
		)
		.await;
		Ok(())
	}

	/// Grant a role. Returns false if the account already had it.
	pub async fn assign_role(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		role: Role,
	) -> Result<bool, AuthError> {
		let added = self.store.assign_role(account_id, role).await?;
		if added {
			self.record_audit(
				AuditAction::RoleAssign,
				actor_id,
				Some(*account_id),
				json!({ "role": role.as_str() }),
			)
			.await;
		}
		Ok(added)
	}

	/// Remove a role. Removing administrator from the last enabled
	/// administrator is refused. Returns false if the account lacked it.
	pub async fn revoke_role(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		role: Role,
	) -> Result<bool, AuthError> {
		let removed = if role == Role::Administrator {
			let _guard = self.admin_lock.lock().await;
			let account = self.get_account(account_id).await?;
			self.guard_admin_transition(&account, Some(AdminState::EnabledNonAdmin))
				.await?;
			self.store.remove_role(account_id, role).await?
		} else {
			self.store.remove_role(account_id, role).await?
		};

		if removed {
			self.record_audit(
				AuditAction::RoleRevoke,
				actor_id,
				Some(*account_id),
				json!({ "role": role.as_str() }),
			)
			.await;
		}
		Ok(removed)
	}

	/// Replace the account's whole role set. Guarded when the new set drops
	/// administrator.
	pub async fn set_roles(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		roles: BTreeSet<Role>,
	) -> Result<Account, AuthError> {
		let guard = self.admin_lock.lock().await;
		let account = self.get_account(account_id).await?;
		if drops_administrator(&account.roles, &roles) {
			self.guard_admin_transition(&account, Some(AdminState::EnabledNonAdmin))
				.await?;
		}
		self.store.set_roles(account_id, &roles).await?;
		drop(guard);

		for role in roles.difference(&account.roles) {
			self.record_audit(
				AuditAction::RoleAssign,
				actor_id,
				Some(*account_id),
				json!({ "role": role.as_str() }),
			)
			.await;
		}
		for role in account.roles.difference(&roles) {
			self.record_audit(
				AuditAction::RoleRevoke,
				actor_id,
				Some(*account_id),
				json!({ "role": role.as_str() }),
			)
			.await;
		}
		self.get_account(account_id).await
	}
}
