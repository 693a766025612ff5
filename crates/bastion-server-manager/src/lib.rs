// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The bastion authentication and authorization manager.
//!
//! [`AuthManager`] ties the password policy, rate limiter, session store,
//! role checks and audit log to an [`AccountStore`](bastion_server_db::AccountStore).
//! Handlers hold an `Arc<AuthManager>` and call into it for every
//! credential check, session lookup, role check and privileged mutation.

mod admin;
mod authn;
mod credentials;
mod manager;

pub use authn::Authenticated;
pub use manager::AuthManager;
