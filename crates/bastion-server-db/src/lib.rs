// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable account storage for bastion.
//!
//! [`AccountStore`] is the contract the manager consumes. It has a SQLite
//! implementation ([`AccountRepository`]) and a process-local one
//! ([`MemoryAccountStore`]).

pub mod account;
pub mod error;
pub mod memory;
pub mod pool;
pub mod testing;

pub use account::{AccountRepository, AccountStore};
pub use error::{DbError, Result, CREDENTIAL_CONFLICT, USERNAME_CONFLICT};
pub use memory::MemoryAccountStore;
pub use pool::{create_pool, migrate};
