// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session lifetime configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;
pub const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
	pub ttl_secs: u64,
	pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
	fn default() -> Self {
		SessionConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfigLayer {
	#[serde(default)]
	pub ttl_secs: Option<u64>,
	#[serde(default)]
	pub cleanup_interval_secs: Option<u64>,
}

impl SessionConfigLayer {
	pub fn merge(&mut self, other: SessionConfigLayer) {
		if other.ttl_secs.is_some() {
			self.ttl_secs = other.ttl_secs;
		}
		if other.cleanup_interval_secs.is_some() {
			self.cleanup_interval_secs = other.cleanup_interval_secs;
		}
	}

	pub fn finalize(self) -> SessionConfig {
		SessionConfig {
			ttl_secs: self.ttl_secs.unwrap_or(DEFAULT_SESSION_TTL_SECS),
			cleanup_interval_secs: self
				.cleanup_interval_secs
				.unwrap_or(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS),
		}
	}
}
