// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use bastion_common_secret::SecretString;
use bastion_server_audit::{AuditFilterConfig, AuditLog, AuditSink, MemoryAuditSink};
use bastion_server_auth::{Account, Role};
use bastion_server_config::{PasswordConfig, RateLimitConfig, ServerConfig};
use bastion_server_db::{AccountStore, MemoryAccountStore};
use bastion_server_manager::AuthManager;

pub const PASSWORD: &str = "correct horse battery";
pub const MAX_FAILURES: u32 = 3;

/// Argon2 at the cheapest cost the crate accepts.
pub fn cheap_password_config() -> PasswordConfig {
	PasswordConfig {
		min_length: 8,
		max_length: 64,
		memory_kib: 256,
		iterations: 1,
		parallelism: 1,
		..PasswordConfig::default()
	}
}

pub fn test_config() -> ServerConfig {
	ServerConfig {
		password: cheap_password_config(),
		rate_limit: RateLimitConfig {
			max_failures: MAX_FAILURES,
			window_secs: 60,
			lockout_secs: 60,
			..RateLimitConfig::default()
		},
		..ServerConfig::default()
	}
}

pub fn secret(s: &str) -> SecretString {
	SecretString::from(s)
}

pub struct TestManager {
	pub manager: Arc<AuthManager>,
	pub store: Arc<MemoryAccountStore>,
	pub audit: Arc<MemoryAuditSink>,
}

impl TestManager {
	pub fn new() -> Self {
		Self::with_config(test_config())
	}

	pub fn with_config(config: ServerConfig) -> Self {
		Self::with_store(config, Arc::new(MemoryAccountStore::new()))
	}

	/// A second manager over an existing store, e.g. after a policy change.
	pub fn with_store(config: ServerConfig, store: Arc<MemoryAccountStore>) -> Self {
		let audit = Arc::new(MemoryAuditSink::default());
		let log = AuditLog::new(
			AuditFilterConfig::all(),
			vec![audit.clone() as Arc<dyn AuditSink>],
		);
		let manager = AuthManager::new(store.clone() as Arc<dyn AccountStore>, &config, log).unwrap();
		Self {
			manager: Arc::new(manager),
			store,
			audit,
		}
	}

	pub async fn account(&self, username: &str, roles: &[Role]) -> Account {
		self.manager
			.create_account(None, username, &secret(PASSWORD), roles.iter().copied())
			.await
			.unwrap()
	}

	pub async fn admin(&self, username: &str) -> Account {
		self.account(username, &[Role::Administrator]).await
	}
}
