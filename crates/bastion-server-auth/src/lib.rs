// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and role-based access control primitives for bastion.
//!
//! This crate provides:
//! - Account and hardware credential records
//! - Password policy: length limits, Argon2 hashing, rehash detection
//! - Session records and bearer token generation
//! - The role ladder and the last-administrator guard
//! - Error types with a caller-safe projection
//!
//! Nothing here performs I/O. Storage lives in `bastion-server-db`, live
//! session state in `bastion-server-session`, and orchestration in
//! `bastion-server-manager`.
//!
//! # Security Considerations
//!
//! - Passwords are stored as Argon2 PHC strings, never plaintext
//! - Session tokens are stored as SHA-256 hashes
//! - Secrets use [`bastion_common_secret::SecretString`] to prevent accidental logging

pub mod account;
pub mod error;
pub mod password;
pub mod rbac;
pub mod session;
pub mod types;

pub use account::{normalize_username, validate_username, Account, AdminState, CredentialHandle};
pub use error::{AuthError, PublicError};
pub use password::{HashedPassword, PasswordAlgorithm, PasswordPolicy};
pub use rbac::{authorize, drops_administrator, ensure_other_administrators, require_role};
pub use session::{
	generate_session_token, hash_token, ClientMetadata, RevocationReason, Session, SessionStatus,
	SESSION_TOKEN_BYTES,
};
pub use types::{AccountId, CredentialId, Role, SessionId};
