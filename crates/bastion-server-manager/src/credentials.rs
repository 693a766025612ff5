// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hardware credential records. Only the records are managed here; the
//! challenge/response ceremony that produces them lives with the caller.

use bastion_server_audit::AuditAction;
use bastion_server_auth::{AccountId, AuthError, CredentialHandle, CredentialId};
use serde_json::json;

use crate::manager::AuthManager;

impl AuthManager {
	pub async fn register_credential(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		external_id: Vec<u8>,
		public_key: Vec<u8>,
		label: Option<String>,
	) -> Result<CredentialHandle, AuthError> {
		let account = self.get_account(account_id).await?;
		let credential = CredentialHandle::new(account.id, external_id, public_key, label);
		self.store.add_credential(&credential).await?;

		self.record_audit(
			AuditAction::CredentialRegister,
			actor_id,
			Some(account.id),
			json!({ "credential_id": credential.id.to_string(), "label": credential.label }),
		)
		.await;
		Ok(credential)
	}

	pub async fn list_credentials(&self, account_id: &AccountId) -> Result<Vec<CredentialHandle>, AuthError> {
		Ok(self.store.list_credentials(account_id).await?)
	}

	/// Returns false if the account has no such credential.
	pub async fn delete_credential(
		&self,
		actor_id: Option<AccountId>,
		account_id: &AccountId,
		credential_id: &CredentialId,
	) -> Result<bool, AuthError> {
		let deleted = self.store.delete_credential(account_id, credential_id).await?;
		if deleted {
			self.record_audit(
				AuditAction::CredentialDelete,
				actor_id,
				Some(*account_id),
				json!({ "credential_id": credential_id.to_string() }),
			)
			.await;
		}
		Ok(deleted)
	}
}
