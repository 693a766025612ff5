// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./bastion.db")
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(max_connections)
		.connect_with(options)
		.await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

const SCHEMA: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS accounts (
		id TEXT PRIMARY KEY,
		username TEXT NOT NULL,
		username_normalized TEXT NOT NULL UNIQUE,
		password_hash TEXT NOT NULL,
		password_algorithm TEXT NOT NULL,
		password_updated_at TEXT NOT NULL,
		disabled_at TEXT,
		last_login_at TEXT,
		created_at TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS account_roles (
		account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
		role TEXT NOT NULL,
		assigned_at TEXT NOT NULL,
		PRIMARY KEY (account_id, role)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_account_roles_role ON account_roles(role)",
	r#"
	CREATE TABLE IF NOT EXISTS credentials (
		id TEXT PRIMARY KEY,
		account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
		external_id BLOB NOT NULL UNIQUE,
		public_key BLOB NOT NULL,
		label TEXT,
		created_at TEXT NOT NULL,
		last_used_at TEXT
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_credentials_account ON credentials(account_id)",
	r#"
	CREATE TABLE IF NOT EXISTS audit_log (
		id TEXT PRIMARY KEY,
		sequence INTEGER NOT NULL,
		timestamp TEXT NOT NULL,
		action TEXT NOT NULL,
		severity TEXT NOT NULL,
		actor_id TEXT,
		target_id TEXT,
		metadata TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
];

/// Create every table this workspace uses. Idempotent.
#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<(), DbError> {
	for statement in SCHEMA {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(statements = SCHEMA.len(), "schema applied");
	Ok(())
}
