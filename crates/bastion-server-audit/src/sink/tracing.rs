// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::Level;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditEntry, AuditSeverity};
use crate::filter::AuditFilterConfig;

/// Mirrors audit entries into the log stream under the `bastion_audit` target.
pub struct TracingAuditSink {
	filter: AuditFilterConfig,
}

impl TracingAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self { filter }
	}
}

pub fn severity_to_level(severity: AuditSeverity) -> Level {
	match severity {
		AuditSeverity::Debug => Level::DEBUG,
		AuditSeverity::Info | AuditSeverity::Notice => Level::INFO,
		AuditSeverity::Warning => Level::WARN,
		AuditSeverity::Critical => Level::ERROR,
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		"tracing"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		let action = entry.action.as_str();
		let severity = entry.severity.as_str();
		let id = entry.id.to_string();
		let sequence = entry.sequence;
		let timestamp = entry.timestamp.to_rfc3339();
		let actor_id = entry.actor_id.map(|a| a.to_string());
		let target_id = entry.target_id.map(|t| t.to_string());
		let metadata = if entry.metadata.is_null() {
			None
		} else {
			Some(entry.metadata.to_string())
		};

		match severity_to_level(entry.severity) {
			Level::DEBUG => tracing::debug!(
				target: "bastion_audit",
				action, severity, id, sequence, timestamp, actor_id, target_id, metadata,
				"audit"
			),
			Level::INFO => tracing::info!(
				target: "bastion_audit",
				action, severity, id, sequence, timestamp, actor_id, target_id, metadata,
				"audit"
			),
			Level::WARN => tracing::warn!(
				target: "bastion_audit",
				action, severity, id, sequence, timestamp, actor_id, target_id, metadata,
				"audit"
			),
			_ => tracing::error!(
				target: "bastion_audit",
				action, severity, id, sequence, timestamp, actor_id, target_id, metadata,
				"audit"
			),
		}

		Ok(())
	}
}
