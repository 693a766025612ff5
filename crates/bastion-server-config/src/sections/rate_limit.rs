// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failed-login throttling configuration.
//!
//! Defaults: five failures inside a sixty second fixed window lock the
//! identity out for sixty seconds.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_LOCKOUT_SECS: u64 = 60;
pub const DEFAULT_IDLE_TTL_SECS: u64 = 600;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitConfig {
	/// Failures inside one window that trigger a lockout.
	pub max_failures: u32,
	pub window_secs: u64,
	pub lockout_secs: u64,
	/// Buckets untouched for this long are evicted.
	pub idle_ttl_secs: u64,
	pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		RateLimitConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitConfigLayer {
	#[serde(default)]
	pub max_failures: Option<u32>,
	#[serde(default)]
	pub window_secs: Option<u64>,
	#[serde(default)]
	pub lockout_secs: Option<u64>,
	#[serde(default)]
	pub idle_ttl_secs: Option<u64>,
	#[serde(default)]
	pub cleanup_interval_secs: Option<u64>,
}

impl RateLimitConfigLayer {
	pub fn merge(&mut self, other: RateLimitConfigLayer) {
		if other.max_failures.is_some() {
			self.max_failures = other.max_failures;
		}
		if other.window_secs.is_some() {
			self.window_secs = other.window_secs;
		}
		if other.lockout_secs.is_some() {
			self.lockout_secs = other.lockout_secs;
		}
		if other.idle_ttl_secs.is_some() {
			self.idle_ttl_secs = other.idle_ttl_secs;
		}
		if other.cleanup_interval_secs.is_some() {
			self.cleanup_interval_secs = other.cleanup_interval_secs;
		}
	}

	pub fn finalize(self) -> RateLimitConfig {
		RateLimitConfig {
			max_failures: self.max_failures.unwrap_or(DEFAULT_MAX_FAILURES),
			window_secs: self.window_secs.unwrap_or(DEFAULT_WINDOW_SECS),
			lockout_secs: self.lockout_secs.unwrap_or(DEFAULT_LOCKOUT_SECS),
			idle_ttl_secs: self.idle_ttl_secs.unwrap_or(DEFAULT_IDLE_TTL_SECS),
			cleanup_interval_secs: self
				.cleanup_interval_secs
				.unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
		}
	}
}
