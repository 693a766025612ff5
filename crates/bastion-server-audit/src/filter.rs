// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::event::{AuditAction, AuditEntry, AuditSeverity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFilterConfig {
	pub min_severity: AuditSeverity,
	pub include_actions: Option<Vec<AuditAction>>,
	pub exclude_actions: Option<Vec<AuditAction>>,
}

impl Default for AuditFilterConfig {
	fn default() -> Self {
		Self {
			min_severity: AuditSeverity::Info,
			include_actions: None,
			exclude_actions: None,
		}
	}
}

impl AuditFilterConfig {
	/// Accept everything, including debug entries.
	pub fn all() -> Self {
		Self {
			min_severity: AuditSeverity::Debug,
			..Self::default()
		}
	}

	pub fn with_min_severity(min_severity: AuditSeverity) -> Self {
		Self {
			min_severity,
			..Self::default()
		}
	}

	pub fn allows(&self, entry: &AuditEntry) -> bool {
		if entry.severity < self.min_severity {
			return false;
		}

		if let Some(ref exclude) = self.exclude_actions {
			if exclude.contains(&entry.action) {
				return false;
			}
		}

		if let Some(ref include) = self.include_actions {
			if !include.contains(&entry.action) {
				return false;
			}
		}

		true
	}
}
