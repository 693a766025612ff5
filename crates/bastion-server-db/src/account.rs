// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account repository for database operations.
//!
//! The store is the single writer of durable account, role and credential
//! data. It enforces uniqueness of the normalized username and nothing else;
//! the last-administrator invariant is the caller's job, using
//! [`AccountStore::count_enabled_with_role`].

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use bastion_server_auth::{
	normalize_username, Account, AccountId, CredentialHandle, CredentialId, HashedPassword,
	PasswordAlgorithm, Role,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, sqlite::SqliteRow, Row};

use crate::error::{DbError, CREDENTIAL_CONFLICT, USERNAME_CONFLICT};

#[async_trait]
pub trait AccountStore: Send + Sync {
	async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, DbError>;
	/// Lookup by any spelling; the store normalizes.
	async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError>;
	async fn list_accounts(&self) -> Result<Vec<Account>, DbError>;
	/// `Conflict` if the normalized username is taken.
	async fn create_account(&self, account: &Account) -> Result<(), DbError>;
	async fn update_username(&self, id: &AccountId, username: &str) -> Result<(), DbError>;
	async fn update_password(&self, id: &AccountId, password: &HashedPassword)
		-> Result<(), DbError>;
	/// Store `password` only if the current hash is still `expected_hash`.
	/// Returns false, leaving the account untouched, when it has changed.
	async fn replace_password(
		&self,
		id: &AccountId,
		expected_hash: &str,
		password: &HashedPassword,
	) -> Result<bool, DbError>;
	async fn set_disabled_at(
		&self,
		id: &AccountId,
		disabled_at: Option<DateTime<Utc>>,
	) -> Result<(), DbError>;
	async fn record_login(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), DbError>;
	/// Removes the account with its role assignments and credential handles.
	async fn delete_account(&self, id: &AccountId) -> Result<(), DbError>;
	/// Returns false if the role was already held.
	async fn assign_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError>;
	/// Returns false if the role was not held.
	async fn remove_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError>;
	async fn set_roles(&self, id: &AccountId, roles: &BTreeSet<Role>) -> Result<(), DbError>;
	/// Enabled accounts holding `role`, not counting `exclude`.
	async fn count_enabled_with_role(
		&self,
		role: Role,
		exclude: Option<&AccountId>,
	) -> Result<u64, DbError>;
	/// Accounts holding `role`, enabled or not.
	async fn count_with_role(&self, role: Role) -> Result<u64, DbError>;
	async fn add_credential(&self, credential: &CredentialHandle) -> Result<(), DbError>;
	async fn list_credentials(&self, id: &AccountId) -> Result<Vec<CredentialHandle>, DbError>;
	/// Returns false if no such credential belongs to the account.
	async fn delete_credential(
		&self,
		id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, DbError>;
	async fn delete_credentials_for_account(&self, id: &AccountId) -> Result<u64, DbError>;
}

#[async_trait]
impl AccountStore for AccountRepository {
	async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, DbError> {
		self.get_account(id).await
	}

	async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
		self.get_account_by_username(username).await
	}

	async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
		self.list_accounts().await
	}

	async fn create_account(&self, account: &Account) -> Result<(), DbError> {
		self.create_account(account).await
	}

	async fn update_username(&self, id: &AccountId, username: &str) -> Result<(), DbError> {
		self.update_username(id, username).await
	}

	async fn update_password(
		&self,
		id: &AccountId,
		password: &HashedPassword,
	) -> Result<(), DbError> {
		self.update_password(id, password).await
	}

	async fn replace_password(
		&self,
		id: &AccountId,
		expected_hash: &str,
		password: &HashedPassword,
	) -> Result<bool, DbError> {
		self.replace_password(id, expected_hash, password).await
	}

	async fn set_disabled_at(
		&self,
		id: &AccountId,
		disabled_at: Option<DateTime<Utc>>,
	) -> Result<(), DbError> {
		self.set_disabled_at(id, disabled_at).await
	}

	async fn record_login(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), DbError> {
		self.record_login(id, at).await
	}

	async fn delete_account(&self, id: &AccountId) -> Result<(), DbError> {
		self.delete_account(id).await
	}

	async fn assign_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.assign_role(id, role).await
	}

	async fn remove_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.remove_role(id, role).await
	}

	async fn set_roles(&self, id: &AccountId, roles: &BTreeSet<Role>) -> Result<(), DbError> {
		self.set_roles(id, roles).await
	}

	async fn count_enabled_with_role(
		&self,
		role: Role,
		exclude: Option<&AccountId>,
	) -> Result<u64, DbError> {
		self.count_enabled_with_role(role, exclude).await
	}

	async fn count_with_role(&self, role: Role) -> Result<u64, DbError> {
		self.count_with_role(role).await
	}

	async fn add_credential(&self, credential: &CredentialHandle) -> Result<(), DbError> {
		self.add_credential(credential).await
	}

	async fn list_credentials(&self, id: &AccountId) -> Result<Vec<CredentialHandle>, DbError> {
		self.list_credentials(id).await
	}

	async fn delete_credential(
		&self,
		id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, DbError> {
		self.delete_credential(id, credential_id).await
	}

	async fn delete_credentials_for_account(&self, id: &AccountId) -> Result<u64, DbError> {
		self.delete_credentials_for_account(id).await
	}
}

/// Repository for account, role and credential-handle persistence.
#[derive(Clone)]
pub struct AccountRepository {
	pool: SqlitePool,
}

const ACCOUNT_COLUMNS: &str = "id, username, username_normalized, password_hash, \
	password_algorithm, password_updated_at, disabled_at, last_login_at, created_at, updated_at";

impl AccountRepository {
	/// Create a new account repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.hydrate(&row).await?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self, username))]
	pub async fn get_account_by_username(
		&self,
		username: &str,
	) -> Result<Option<Account>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username_normalized = ?"
		))
		.bind(normalize_username(username))
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.hydrate(&row).await?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY username_normalized"
		))
		.fetch_all(&self.pool)
		.await?;

		let mut accounts = Vec::with_capacity(rows.len());
		for row in &rows {
			accounts.push(self.hydrate(row).await?);
		}
		Ok(accounts)
	}

	/// Insert the account and its roles in one transaction.
	///
	/// # Errors
	/// `DbError::Conflict("username")` if the normalized username exists.
	#[tracing::instrument(skip(self, account), fields(account_id = %account.id))]
	pub async fn create_account(&self, account: &Account) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO accounts (
				id, username, username_normalized, password_hash, password_algorithm,
				password_updated_at, disabled_at, last_login_at, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(account.id.to_string())
		.bind(&account.username)
		.bind(&account.username_normalized)
		.bind(&account.password_hash)
		.bind(account.password_algorithm.as_str())
		.bind(account.password_updated_at.to_rfc3339())
		.bind(account.disabled_at.map(|t| t.to_rfc3339()))
		.bind(account.last_login_at.map(|t| t.to_rfc3339()))
		.bind(account.created_at.to_rfc3339())
		.bind(account.updated_at.to_rfc3339())
		.execute(&mut *tx)
		.await
		.map_err(map_username_conflict)?;

		let now = Utc::now().to_rfc3339();
		for role in &account.roles {
			sqlx::query("INSERT INTO account_roles (account_id, role, assigned_at) VALUES (?, ?, ?)")
				.bind(account.id.to_string())
				.bind(role.as_str())
				.bind(&now)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;
		tracing::debug!(account_id = %account.id, roles = account.roles.len(), "account created");
		Ok(())
	}

	#[tracing::instrument(skip(self, username), fields(account_id = %id))]
	pub async fn update_username(&self, id: &AccountId, username: &str) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			UPDATE accounts
			SET username = ?, username_normalized = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(username)
		.bind(normalize_username(username))
		.bind(Utc::now().to_rfc3339())
		.bind(id.to_string())
		.execute(&self.pool)
		.await
		.map_err(map_username_conflict)?;

		require_row(result.rows_affected(), "account")
	}

	#[tracing::instrument(skip(self, password), fields(account_id = %id, algorithm = %password.algorithm))]
	pub async fn update_password(
		&self,
		id: &AccountId,
		password: &HashedPassword,
	) -> Result<(), DbError> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE accounts
			SET password_hash = ?, password_algorithm = ?, password_updated_at = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&password.hash)
		.bind(password.algorithm.as_str())
		.bind(&now)
		.bind(&now)
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;

		require_row(result.rows_affected(), "account")
	}

	#[tracing::instrument(skip(self, expected_hash, password), fields(account_id = %id))]
	pub async fn replace_password(
		&self,
		id: &AccountId,
		expected_hash: &str,
		password: &HashedPassword,
	) -> Result<bool, DbError> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE accounts
			SET password_hash = ?, password_algorithm = ?, password_updated_at = ?, updated_at = ?
			WHERE id = ? AND password_hash = ?
			"#,
		)
		.bind(&password.hash)
		.bind(password.algorithm.as_str())
		.bind(&now)
		.bind(&now)
		.bind(id.to_string())
		.bind(expected_hash)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			self.ensure_exists(id).await?;
			return Ok(false);
		}
		Ok(true)
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn set_disabled_at(
		&self,
		id: &AccountId,
		disabled_at: Option<DateTime<Utc>>,
	) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE accounts SET disabled_at = ?, updated_at = ? WHERE id = ?")
			.bind(disabled_at.map(|t| t.to_rfc3339()))
			.bind(Utc::now().to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		require_row(result.rows_affected(), "account")
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn record_login(&self, id: &AccountId, at: DateTime<Utc>) -> Result<(), DbError> {
		let result = sqlx::query("UPDATE accounts SET last_login_at = ? WHERE id = ?")
			.bind(at.to_rfc3339())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		require_row(result.rows_affected(), "account")
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn delete_account(&self, id: &AccountId) -> Result<(), DbError> {
		let mut tx = self.pool.begin().await?;
		let id_str = id.to_string();

		let credentials = sqlx::query("DELETE FROM credentials WHERE account_id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?
			.rows_affected();
		sqlx::query("DELETE FROM account_roles WHERE account_id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?;
		let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound("account".to_string()));
		}

		tx.commit().await?;
		tracing::debug!(account_id = %id, credentials, "account deleted");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(account_id = %id, role = %role))]
	pub async fn assign_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.ensure_exists(id).await?;
		let result = sqlx::query(
			"INSERT OR IGNORE INTO account_roles (account_id, role, assigned_at) VALUES (?, ?, ?)",
		)
		.bind(id.to_string())
		.bind(role.as_str())
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self), fields(account_id = %id, role = %role))]
	pub async fn remove_role(&self, id: &AccountId, role: Role) -> Result<bool, DbError> {
		self.ensure_exists(id).await?;
		let result = sqlx::query("DELETE FROM account_roles WHERE account_id = ? AND role = ?")
			.bind(id.to_string())
			.bind(role.as_str())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() == 1)
	}

	/// Replace the whole role set in one transaction.
	#[tracing::instrument(skip(self, roles), fields(account_id = %id, roles = roles.len()))]
	pub async fn set_roles(&self, id: &AccountId, roles: &BTreeSet<Role>) -> Result<(), DbError> {
		self.ensure_exists(id).await?;
		let mut tx = self.pool.begin().await?;
		let id_str = id.to_string();
		let now = Utc::now().to_rfc3339();

		sqlx::query("DELETE FROM account_roles WHERE account_id = ?")
			.bind(&id_str)
			.execute(&mut *tx)
			.await?;
		for role in roles {
			sqlx::query("INSERT INTO account_roles (account_id, role, assigned_at) VALUES (?, ?, ?)")
				.bind(&id_str)
				.bind(role.as_str())
				.bind(&now)
				.execute(&mut *tx)
				.await?;
		}

		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(role = %role))]
	pub async fn count_enabled_with_role(
		&self,
		role: Role,
		exclude: Option<&AccountId>,
	) -> Result<u64, DbError> {
		let exclude = exclude.map(|id| id.to_string());
		let count: i64 = sqlx::query_scalar(
			r#"
			SELECT COUNT(*)
			FROM accounts a
			JOIN account_roles r ON r.account_id = a.id
			WHERE r.role = ?
			  AND a.disabled_at IS NULL
			  AND (? IS NULL OR a.id != ?)
			"#,
		)
		.bind(role.as_str())
		.bind(&exclude)
		.bind(&exclude)
		.fetch_one(&self.pool)
		.await?;

		to_count(count)
	}

	#[tracing::instrument(skip(self), fields(role = %role))]
	pub async fn count_with_role(&self, role: Role) -> Result<u64, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_roles WHERE role = ?")
			.bind(role.as_str())
			.fetch_one(&self.pool)
			.await?;

		to_count(count)
	}

	#[tracing::instrument(skip(self, credential), fields(account_id = %credential.account_id, credential_id = %credential.id))]
	pub async fn add_credential(&self, credential: &CredentialHandle) -> Result<(), DbError> {
		self.ensure_exists(&credential.account_id).await?;
		sqlx::query(
			r#"
			INSERT INTO credentials (
				id, account_id, external_id, public_key, label, created_at, last_used_at
			) VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(credential.id.to_string())
		.bind(credential.account_id.to_string())
		.bind(&credential.external_id)
		.bind(&credential.public_key)
		.bind(&credential.label)
		.bind(credential.created_at.to_rfc3339())
		.bind(credential.last_used_at.map(|t| t.to_rfc3339()))
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				DbError::Conflict(CREDENTIAL_CONFLICT.to_string())
			}
			other => DbError::Sqlx(other),
		})?;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn list_credentials(&self, id: &AccountId) -> Result<Vec<CredentialHandle>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, account_id, external_id, public_key, label, created_at, last_used_at
			FROM credentials
			WHERE account_id = ?
			ORDER BY created_at
			"#,
		)
		.bind(id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_credential_row).collect()
	}

	#[tracing::instrument(skip(self), fields(account_id = %id, credential_id = %credential_id))]
	pub async fn delete_credential(
		&self,
		id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM credentials WHERE id = ? AND account_id = ?")
			.bind(credential_id.to_string())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self), fields(account_id = %id))]
	pub async fn delete_credentials_for_account(&self, id: &AccountId) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM credentials WHERE account_id = ?")
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	async fn ensure_exists(&self, id: &AccountId) -> Result<(), DbError> {
		let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		exists
			.map(|_| ())
			.ok_or_else(|| DbError::NotFound("account".to_string()))
	}

	async fn hydrate(&self, row: &SqliteRow) -> Result<Account, DbError> {
		let mut account = parse_account_row(row)?;
		let roles: Vec<String> =
			sqlx::query_scalar("SELECT role FROM account_roles WHERE account_id = ?")
				.bind(account.id.to_string())
				.fetch_all(&self.pool)
				.await?;
		account.roles = roles
			.iter()
			.map(|r| Role::from_str(r).map_err(DbError::Internal))
			.collect::<Result<BTreeSet<_>, _>>()?;
		Ok(account)
	}
}

fn map_username_conflict(e: sqlx::Error) -> DbError {
	match e {
		sqlx::Error::Database(ref db) if db.is_unique_violation() => {
			DbError::Conflict(USERNAME_CONFLICT.to_string())
		}
		other => DbError::Sqlx(other),
	}
}

fn require_row(rows_affected: u64, what: &str) -> Result<(), DbError> {
	if rows_affected == 0 {
		Err(DbError::NotFound(what.to_string()))
	} else {
		Ok(())
	}
}

fn to_count(count: i64) -> Result<u64, DbError> {
	u64::try_from(count).map_err(|e| DbError::Internal(format!("Invalid count: {e}")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	Ok(DateTime::parse_from_rfc3339(value)
		.map_err(|e| DbError::Internal(format!("Invalid timestamp: {e}")))?
		.with_timezone(&Utc))
}

fn parse_optional_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
	value.as_deref().map(parse_timestamp).transpose()
}

fn parse_account_row(row: &SqliteRow) -> Result<Account, DbError> {
	let id: String = row.get("id");
	let algorithm: String = row.get("password_algorithm");
	let password_updated_at: String = row.get("password_updated_at");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Account {
		id: AccountId::from_str(&id)
			.map_err(|e| DbError::Internal(format!("Invalid account ID: {e}")))?,
		username: row.get("username"),
		username_normalized: row.get("username_normalized"),
		password_hash: row.get("password_hash"),
		password_algorithm: PasswordAlgorithm::from_str(&algorithm).map_err(DbError::Internal)?,
		password_updated_at: parse_timestamp(&password_updated_at)?,
		disabled_at: parse_optional_timestamp(row.get("disabled_at"))?,
		last_login_at: parse_optional_timestamp(row.get("last_login_at"))?,
		created_at: parse_timestamp(&created_at)?,
		updated_at: parse_timestamp(&updated_at)?,
		roles: BTreeSet::new(),
	})
}

fn parse_credential_row(row: &SqliteRow) -> Result<CredentialHandle, DbError> {
	let id: String = row.get("id");
	let account_id: String = row.get("account_id");
	let created_at: String = row.get("created_at");

	Ok(CredentialHandle {
		id: CredentialId::from_str(&id)
			.map_err(|e| DbError::Internal(format!("Invalid credential ID: {e}")))?,
		account_id: AccountId::from_str(&account_id)
			.map_err(|e| DbError::Internal(format!("Invalid account ID: {e}")))?,
		external_id: row.get("external_id"),
		public_key: row.get("public_key"),
		label: row.get("label"),
		created_at: parse_timestamp(&created_at)?,
		last_used_at: parse_optional_timestamp(row.get("last_used_at"))?,
	})
}
