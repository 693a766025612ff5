// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit entry types.
//!
//! - [`AuditAction`]: the closed set of security-relevant actions, each with
//!   a stable dotted tag (`user.create`, `session.revoke`, ...)
//! - [`AuditSeverity`]: how loudly an entry should be surfaced
//! - [`AuditEntry`]: one immutable record, built with [`AuditEntryBuilder`]

use std::fmt;
use std::str::FromStr;

use bastion_server_auth::AccountId;
use bastion_server_config::AuditSeverityLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Security-relevant actions recorded by the manager and by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
	#[serde(rename = "bootstrap")]
	Bootstrap,
	#[serde(rename = "login.success")]
	LoginSuccess,
	#[serde(rename = "login.fail")]
	LoginFail,
	#[serde(rename = "login.lockout")]
	LoginLockout,
	#[serde(rename = "logout")]
	Logout,
	#[serde(rename = "session.issue")]
	SessionIssue,
	#[serde(rename = "session.revoke")]
	SessionRevoke,
	#[serde(rename = "password.reset")]
	PasswordReset,
	#[serde(rename = "password.change")]
	PasswordChange,
	#[serde(rename = "user.create")]
	UserCreate,
	#[serde(rename = "user.update")]
	UserUpdate,
	#[serde(rename = "user.disable")]
	UserDisable,
	#[serde(rename = "user.enable")]
	UserEnable,
	#[serde(rename = "user.delete")]
	UserDelete,
	#[serde(rename = "role.assign")]
	RoleAssign,
	#[serde(rename = "role.revoke")]
	RoleRevoke,
	#[serde(rename = "credential.register")]
	CredentialRegister,
	#[serde(rename = "credential.delete")]
	CredentialDelete,
	#[serde(rename = "access.denied")]
	AccessDenied,
}

impl AuditAction {
	pub const ALL: [AuditAction; 19] = [
		AuditAction::Bootstrap,
		AuditAction::LoginSuccess,
		AuditAction::LoginFail,
		AuditAction::LoginLockout,
		AuditAction::Logout,
		AuditAction::SessionIssue,
		AuditAction::SessionRevoke,
		AuditAction::PasswordReset,
		AuditAction::PasswordChange,
		AuditAction::UserCreate,
		AuditAction::UserUpdate,
		AuditAction::UserDisable,
		AuditAction::UserEnable,
		AuditAction::UserDelete,
		AuditAction::RoleAssign,
		AuditAction::RoleRevoke,
		AuditAction::CredentialRegister,
		AuditAction::CredentialDelete,
		AuditAction::AccessDenied,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			AuditAction::Bootstrap => "bootstrap",
			AuditAction::LoginSuccess => "login.success",
			AuditAction::LoginFail => "login.fail",
			AuditAction::LoginLockout => "login.lockout",
			AuditAction::Logout => "logout",
			AuditAction::SessionIssue => "session.issue",
			AuditAction::SessionRevoke => "session.revoke",
			AuditAction::PasswordReset => "password.reset",
			AuditAction::PasswordChange => "password.change",
			AuditAction::UserCreate => "user.create",
			AuditAction::UserUpdate => "user.update",
			AuditAction::UserDisable => "user.disable",
			AuditAction::UserEnable => "user.enable",
			AuditAction::UserDelete => "user.delete",
			AuditAction::RoleAssign => "role.assign",
			AuditAction::RoleRevoke => "role.revoke",
			AuditAction::CredentialRegister => "credential.register",
			AuditAction::CredentialDelete => "credential.delete",
			AuditAction::AccessDenied => "access.denied",
		}
	}

	/// Returns the default severity level for this action.
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditAction::LoginSuccess
			| AuditAction::Logout
			| AuditAction::SessionIssue
			| AuditAction::SessionRevoke
			| AuditAction::PasswordChange
			| AuditAction::UserCreate
			| AuditAction::UserUpdate
			| AuditAction::UserEnable
			| AuditAction::CredentialRegister
			| AuditAction::CredentialDelete => AuditSeverity::Info,

			AuditAction::Bootstrap
			| AuditAction::PasswordReset
			| AuditAction::UserDisable
			| AuditAction::UserDelete
			| AuditAction::RoleAssign
			| AuditAction::RoleRevoke => AuditSeverity::Notice,

			AuditAction::LoginFail | AuditAction::AccessDenied => AuditSeverity::Warning,

			AuditAction::LoginLockout => AuditSeverity::Critical,
		}
	}
}

impl fmt::Display for AuditAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		AuditAction::ALL
			.into_iter()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| format!("unknown audit action '{s}'"))
	}
}

/// Severity levels for audit entries, least to most severe.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug,
	#[default]
	Info,
	Notice,
	Warning,
	Critical,
}

impl AuditSeverity {
	pub fn as_str(&self) -> &'static str {
		match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Critical => "critical",
		}
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuditSeverity {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		AuditSeverityLevel::from_str(s).map(AuditSeverity::from)
	}
}

impl From<AuditSeverityLevel> for AuditSeverity {
	fn from(level: AuditSeverityLevel) -> Self {
		match level {
			AuditSeverityLevel::Debug => AuditSeverity::Debug,
			AuditSeverityLevel::Info => AuditSeverity::Info,
			AuditSeverityLevel::Notice => AuditSeverity::Notice,
			AuditSeverityLevel::Warning => AuditSeverity::Warning,
			AuditSeverityLevel::Critical => AuditSeverity::Critical,
		}
	}
}

/// An immutable record of a security-relevant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
	pub id: Uuid,
	/// Position in the writer's append order. Assigned by [`crate::AuditLog`];
	/// zero until then.
	pub sequence: u64,
	pub timestamp: DateTime<Utc>,
	pub action: AuditAction,
	pub severity: AuditSeverity,
	/// `None` for system actions.
	pub actor_id: Option<AccountId>,
	pub target_id: Option<AccountId>,
	pub metadata: serde_json::Value,
}

impl AuditEntry {
	pub fn builder(action: AuditAction) -> AuditEntryBuilder {
		AuditEntryBuilder::new(action)
	}
}

/// Builder for constructing audit entries with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditEntryBuilder {
	action: AuditAction,
	severity: Option<AuditSeverity>,
	actor_id: Option<AccountId>,
	target_id: Option<AccountId>,
	metadata: serde_json::Value,
}

impl AuditEntryBuilder {
	pub fn new(action: AuditAction) -> Self {
		Self {
			action,
			severity: None,
			actor_id: None,
			target_id: None,
			metadata: serde_json::Value::Null,
		}
	}

	/// Set the severity level. Defaults to the action's default severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn actor(mut self, actor_id: AccountId) -> Self {
		self.actor_id = Some(actor_id);
		self
	}

	pub fn maybe_actor(mut self, actor_id: Option<AccountId>) -> Self {
		self.actor_id = actor_id;
		self
	}

	pub fn target(mut self, target_id: AccountId) -> Self {
		self.target_id = Some(target_id);
		self
	}

	pub fn maybe_target(mut self, target_id: Option<AccountId>) -> Self {
		self.target_id = target_id;
		self
	}

	pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
		self.metadata = metadata;
		self
	}

	pub fn build(self) -> AuditEntry {
		AuditEntry {
			id: Uuid::new_v4(),
			sequence: 0,
			timestamp: Utc::now(),
			action: self.action,
			severity: self
				.severity
				.unwrap_or_else(|| self.action.default_severity()),
			actor_id: self.actor_id,
			target_id: self.target_id,
			metadata: self.metadata,
		}
	}
}
