// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role checks and the last-administrator guard.
//!
//! Disabled accounts are never authorized, whatever roles they hold.

use crate::account::Account;
use crate::error::AuthError;
use crate::types::Role;

/// Whether `account` may act with `required`.
pub fn authorize(account: &Account, required: Role) -> bool {
	account.is_enabled() && account.roles.iter().any(|role| role.satisfies(required))
}

/// Like [`authorize`], but returns the error a caller should surface.
pub fn require_role(account: &Account, required: Role) -> Result<(), AuthError> {
	if !account.is_enabled() {
		return Err(AuthError::AccountDisabled);
	}
	if authorize(account, required) {
		Ok(())
	} else {
		Err(AuthError::Forbidden { required })
	}
}

/// Admit a guarded transition only if some *other* enabled administrator
/// remains. `others` must exclude the account being changed.
pub fn ensure_other_administrators(others: u64) -> Result<(), AuthError> {
	if others == 0 {
		Err(AuthError::LastAdministrator)
	} else {
		Ok(())
	}
}

/// Whether replacing `current` with `next` drops the administrator role.
pub fn drops_administrator<'a>(
	current: impl IntoIterator<Item = &'a Role>,
	next: impl IntoIterator<Item = &'a Role>,
) -> bool {
	let had = current.into_iter().any(|r| *r == Role::Administrator);
	let keeps = next.into_iter().any(|r| *r == Role::Administrator);
	had && !keeps
}
