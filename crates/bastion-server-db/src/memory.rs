// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-local [`AccountStore`] for embedding and tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use bastion_server_auth::{
	normalize_username, Account, AccountId, CredentialHandle, CredentialId, HashedPassword, Role,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::account::AccountStore;
use crate::error::{DbError, CREDENTIAL_CONFLICT, USERNAME_CONFLICT};

#[derive(Default)]
struct State {
	accounts: HashMap<AccountId, Account>,
	credentials: HashMap<CredentialId, CredentialHandle>,
}

impl State {
	fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, DbError> {
		self.accounts
			.get_mut(id)
			.ok_or_else(|| DbError::NotFound("account".to_string()))
	}

	fn username_taken(&self, normalized: &str, except: Option<&AccountId>) -> bool {
		self.accounts
			.values()
			.any(|a| a.username_normalized == normalized && Some(&a.id) != except)
	}
}

#[derive(Default)]
pub struct MemoryAccountStore {
	state: RwLock<State>,
}

impl MemoryAccountStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
	async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, DbError> {
		Ok(self.state.read().await.accounts.get(id).cloned())
	}

	async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
		let normalized = normalize_username(username);
		Ok(self
			.state
			.read()
			.await
			.accounts
			.values()
			.find(|a| a.username_normalized == normalized)
			.cloned())
	}

	async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
		let mut accounts: Vec<_> = self.state.read().await.accounts.values().cloned().collect();
		accounts.sort_by(|a, b| a.username_normalized.cmp(&b.username_normalized));
		Ok(accounts)
	}

	async fn create_account(&self, account: &Account) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		if state.username_taken(&account.username_normalized, None) {
			return Err(DbError::Conflict(USERNAME_CONFLICT.to_string()));
		}
		if state.accounts.contains_key(&account.id) {
			return Err(DbError::Conflict("account id".to_string()));
		}
		state.accounts.insert(account.id, account.clone());
		Ok(())
	}

	async fn update_username(&self, id: &AccountId, username: &str) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		let normalized = normalize_username(username);
		if state.username_taken(&normalized, Some(id)) {
			return Err(DbError::Conflict(USERNAME_CONFLICT.to_string()));
		}
		let account = state.account_mut(id)?;
		account.username = username.to_string();
		account.username_normalized = normalized;
		account.updated_at = Utc::now();
		Ok(())
	}

	async fn update_password(
		&self,
		id: &AccountId,
		password: &HashedPassword,
	) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		let account = state.account_mut(id)?;
		let now = Utc::now();
		account.password_hash = password.hash.clone();
		account.password_algorithm = password.algorithm;
		account.password_updated_at = now;
		account.updated_at = now;
		Ok(())
	}

	async fn replace_password(
		&self,
		id: &AccountId,
		expected_hash: &str,
		password: &HashedPassword,
	) -> Result<bool, DbError> {
		let mut state = self.state.write().await;
		let account = state.account_mut(id)?;
		if account.password_hash != expected_hash {
			return Ok(false);
		}
		let now = Utc::now();
		account.password_hash = password.hash.clone();
		account.password_algorithm = password.algorithm;
		account.password_updated_at = now;
		account.updated_at = now;
		Ok(true)
	}

	async fn set_disabled_at(
		&self,
		id: &AccountId,
		disabled_at: Option<DateTime<Utc>>,
	) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		let account = state.account_mut(id)?;
		account.disabled_at = disabled_at;
		account.updated_at = Utc::now();
		Ok(())
	}

	async fn record_login(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		state.account_mut(id)?.last_login_at = Some(at);
		Ok(())
	}

	async fn delete_account(&self, id: &AccountId) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		if state.accounts.remove(id).is_none() {
			return Err(DbError::NotFound("account".to_string()));
		}
		state.credentials.retain(|_, c| c.account_id != *id);
		Ok(())
	}

	async fn assign_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		let mut state = self.state.write().await;
		Ok(state.account_mut(id)?.roles.insert(role))
	}

	async fn remove_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		let mut state = self.state.write().await;
		Ok(state.account_mut(id)?.roles.remove(&role))
	}

	async fn set_roles(&self, id: &AccountId, roles: &BTreeSet<Role>) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		state.account_mut(id)?.roles = roles.clone();
		Ok(())
	}

	async fn count_enabled_with_role(
		&self,
		role: Role,
		exclude: Option<&AccountId>,
	) -> Result<u64, DbError> {
		let state = self.state.read().await;
		Ok(state
			.accounts
			.values()
			.filter(|a| a.is_enabled() && a.has_role(role) && Some(&a.id) != exclude)
			.count() as u64)
	}

	async fn count_with_role(&self, role: Role) -> Result<u64, DbError> {
		let state = self.state.read().await;
		Ok(state.accounts.values().filter(|a| a.has_role(role)).count() as u64)
	}

	async fn add_credential(&self, credential: &CredentialHandle) -> Result<(), DbError> {
		let mut state = self.state.write().await;
		if !state.accounts.contains_key(&credential.account_id) {
			return Err(DbError::NotFound("account".to_string()));
		}
		if state
			.credentials
			.values()
			.any(|c| c.external_id == credential.external_id)
		{
			return Err(DbError::Conflict(CREDENTIAL_CONFLICT.to_string()));
		}
		state.credentials.insert(credential.id, credential.clone());
		Ok(())
	}

	async fn list_credentials(&self, id: &AccountId) -> Result<Vec<CredentialHandle>, DbError> {
		let state = self.state.read().await;
		let mut credentials: Vec<_> = state
			.credentials
			.values()
			.filter(|c| c.account_id == *id)
			.cloned()
			.collect();
		credentials.sort_by_key(|c| c.created_at);
		Ok(credentials)
	}

	async fn delete_credential(
		&self,
		id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, DbError> {
		let mut state = self.state.write().await;
		let owned = state
			.credentials
			.get(credential_id)
			.is_some_and(|c| c.account_id == *id);
		if owned {
			state.credentials.remove(credential_id);
		}
		Ok(owned)
	}

	async fn delete_credentials_for_account(&self, id: &AccountId) -> Result<u64, DbError> {
		let mut state = self.state.write().await;
		let before = state.credentials.len();
		state.credentials.retain(|_, c| c.account_id != *id);
		Ok((before - state.credentials.len()) as u64)
	}
}
