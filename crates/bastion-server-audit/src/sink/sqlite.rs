// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bastion_server_auth::AccountId;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::error::{AuditError, AuditSinkError};
use crate::event::{AuditAction, AuditEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;
use crate::sink::AuditSink;

/// Durable sink writing to the `audit_log` table.
///
/// The table is created by `bastion_server_db::migrate`; rows are only ever
/// inserted, never updated or deleted.
pub struct SqliteAuditSink {
	pool: SqlitePool,
	filter: AuditFilterConfig,
	name: String,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool, filter: AuditFilterConfig) -> Self {
		Self {
			pool,
			filter,
			name: "sqlite".to_string(),
		}
	}

	/// The newest `limit` entries, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, AuditError> {
		let rows = sqlx::query(
			r#"
			SELECT id, sequence, timestamp, action, severity, actor_id, target_id, metadata
			FROM audit_log
			ORDER BY rowid DESC
			LIMIT ?
			"#,
		)
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await
		.map_err(|e| AuditError::Read(e.to_string()))?;

		let mut entries = rows
			.iter()
			.map(parse_entry_row)
			.collect::<Result<Vec<_>, _>>()?;
		entries.reverse();
		Ok(entries)
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		let metadata_json = serde_json::to_string(&entry.metadata)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize metadata: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO audit_log (
				id, sequence, timestamp, action, severity, actor_id, target_id,
				metadata, created_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(entry.id.to_string())
		.bind(entry.sequence as i64)
		.bind(entry.timestamp.to_rfc3339())
		.bind(entry.action.as_str())
		.bind(entry.severity.as_str())
		.bind(entry.actor_id.map(|a| a.to_string()))
		.bind(entry.target_id.map(|t| t.to_string()))
		.bind(&metadata_json)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}

	async fn health_check(&self) -> Result<(), AuditSinkError> {
		sqlx::query("SELECT 1")
			.execute(&self.pool)
			.await
			.map_err(|e| AuditSinkError::Transient(format!("health check failed: {e}")))?;
		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked")
		}
		_ => false,
	}
}

fn parse_entry_row(row: &SqliteRow) -> Result<AuditEntry, AuditError> {
	let read = |e: sqlx::Error| AuditError::Read(e.to_string());

	let id: String = row.try_get("id").map_err(read)?;
	let sequence: i64 = row.try_get("sequence").map_err(read)?;
	let timestamp: String = row.try_get("timestamp").map_err(read)?;
	let action: String = row.try_get("action").map_err(read)?;
	let severity: String = row.try_get("severity").map_err(read)?;
	let actor_id: Option<String> = row.try_get("actor_id").map_err(read)?;
	let target_id: Option<String> = row.try_get("target_id").map_err(read)?;
	let metadata: String = row.try_get("metadata").map_err(read)?;

	Ok(AuditEntry {
		id: Uuid::parse_str(&id).map_err(|e| AuditError::Read(format!("invalid entry id: {e}")))?,
		sequence: u64::try_from(sequence)
			.map_err(|e| AuditError::Read(format!("invalid sequence: {e}")))?,
		timestamp: DateTime::parse_from_rfc3339(&timestamp)
			.map_err(|e| AuditError::Read(format!("invalid timestamp: {e}")))?
			.with_timezone(&Utc),
		action: AuditAction::from_str(&action).map_err(AuditError::Read)?,
		severity: AuditSeverity::from_str(&severity).map_err(AuditError::Read)?,
		actor_id: parse_account_id(actor_id)?,
		target_id: parse_account_id(target_id)?,
		metadata: serde_json::from_str(&metadata)
			.map_err(|e| AuditError::Read(format!("invalid metadata: {e}")))?,
	})
}

fn parse_account_id(value: Option<String>) -> Result<Option<AccountId>, AuditError> {
	value
		.map(|s| AccountId::from_str(&s))
		.transpose()
		.map_err(|e| AuditError::Read(format!("invalid account id: {e}")))
}
