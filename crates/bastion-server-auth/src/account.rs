// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account records and hardware credential handles.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::password::{HashedPassword, PasswordAlgorithm};
use crate::types::{AccountId, CredentialId, Role};

/// Canonical form used for uniqueness and lookup: trimmed and lowercased.
pub fn normalize_username(username: &str) -> String {
	username.trim().to_lowercase()
}

/// Trim a display username, rejecting blanks.
pub fn validate_username(username: &str) -> Result<String, AuthError> {
	let trimmed = username.trim();
	if trimmed.is_empty() {
		return Err(AuthError::UsernameRequired);
	}
	Ok(trimmed.to_string())
}

/// An identity that can authenticate and hold roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
	pub id: AccountId,
	/// Display form, as entered.
	pub username: String,
	/// Unique key; see [`normalize_username`].
	pub username_normalized: String,
	/// PHC hash string. Never serialized.
	#[serde(skip_serializing, default)]
	pub password_hash: String,
	pub password_algorithm: PasswordAlgorithm,
	pub password_updated_at: DateTime<Utc>,
	/// `None` means enabled.
	pub disabled_at: Option<DateTime<Utc>>,
	pub last_login_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub roles: BTreeSet<Role>,
}

impl Account {
	/// Build a fresh, enabled account.
	pub fn new(
		username: &str,
		password: HashedPassword,
		roles: impl IntoIterator<Item = Role>,
	) -> Result<Self, AuthError> {
		let username = validate_username(username)?;
		let now = Utc::now();
		Ok(Self {
			id: AccountId::generate(),
			username_normalized: normalize_username(&username),
			username,
			password_hash: password.hash,
			password_algorithm: password.algorithm,
			password_updated_at: now,
			disabled_at: None,
			last_login_at: None,
			created_at: now,
			updated_at: now,
			roles: roles.into_iter().collect(),
		})
	}

	pub fn is_enabled(&self) -> bool {
		self.disabled_at.is_none()
	}

	pub fn has_role(&self, role: Role) -> bool {
		self.roles.contains(&role)
	}

	pub fn is_administrator(&self) -> bool {
		self.has_role(Role::Administrator)
	}

	/// Position in the last-administrator state machine.
	pub fn admin_state(&self) -> AdminState {
		if !self.is_enabled() {
			AdminState::Disabled
		} else if self.is_administrator() {
			AdminState::EnabledAdmin
		} else {
			AdminState::EnabledNonAdmin
		}
	}
}

/// States relevant to the "at least one enabled administrator" invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminState {
	EnabledAdmin,
	EnabledNonAdmin,
	Disabled,
}

impl AdminState {
	/// Leaving `EnabledAdmin` for anything else (including deletion, modelled
	/// as `None`) needs another enabled administrator to exist.
	pub fn transition_is_guarded(self, to: Option<AdminState>) -> bool {
		self == AdminState::EnabledAdmin && to != Some(AdminState::EnabledAdmin)
	}
}

/// Opaque record of a hardware-backed credential registered to an account.
///
/// Only the record lifecycle lives here; the ceremony that produces
/// `external_id` and `public_key` happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHandle {
	pub id: CredentialId,
	pub account_id: AccountId,
	/// Authenticator-assigned credential ID.
	pub external_id: Vec<u8>,
	pub public_key: Vec<u8>,
	pub label: Option<String>,
	pub created_at: DateTime<Utc>,
	pub last_used_at: Option<DateTime<Utc>>,
}

impl CredentialHandle {
	pub fn new(
		account_id: AccountId,
		external_id: Vec<u8>,
		public_key: Vec<u8>,
		label: Option<String>,
	) -> Self {
		Self {
			id: CredentialId::generate(),
			account_id,
			external_id,
			public_key,
			label,
			created_at: Utc::now(),
			last_used_at: None,
		}
	}
}
