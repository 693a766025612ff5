// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AuditSink, AuditSinkError};
use crate::event::{AuditAction, AuditEntry};
use crate::filter::AuditFilterConfig;

/// Keeps entries in process memory. Used by tests and by embedders that
/// inspect the trail directly.
pub struct MemoryAuditSink {
	filter: AuditFilterConfig,
	entries: Mutex<Vec<Arc<AuditEntry>>>,
}

impl MemoryAuditSink {
	pub fn new(filter: AuditFilterConfig) -> Self {
		Self {
			filter,
			entries: Mutex::new(Vec::new()),
		}
	}

	/// Snapshot of everything published so far, in append order.
	pub fn entries(&self) -> Vec<Arc<AuditEntry>> {
		match self.entries.lock() {
			Ok(entries) => entries.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	pub fn actions(&self) -> Vec<AuditAction> {
		self.entries().iter().map(|e| e.action).collect()
	}

	pub fn count(&self, action: AuditAction) -> usize {
		self.entries().iter().filter(|e| e.action == action).count()
	}
}

impl Default for MemoryAuditSink {
	fn default() -> Self {
		Self::new(AuditFilterConfig::all())
	}
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
	fn name(&self) -> &str {
		"memory"
	}

	fn filter(&self) -> &AuditFilterConfig {
		&self.filter
	}

	async fn publish(&self, entry: Arc<AuditEntry>) -> Result<(), AuditSinkError> {
		let mut entries = self
			.entries
			.lock()
			.map_err(|_| AuditSinkError::Permanent("memory sink lock poisoned".to_string()))?;
		entries.push(entry);
		Ok(())
	}
}
