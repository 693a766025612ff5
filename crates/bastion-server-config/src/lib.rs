// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the bastion authentication manager.
//!
//! Configuration is layered from built-in defaults, an optional TOML file
//! and `BASTION_*` environment variables, then validated as a whole.
//!
//! ```ignore
//! use bastion_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("lockout after {} failures", config.rate_limit.max_failures);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use serde::Serialize;
use tracing::{debug, info};

/// Longest accepted duration setting (ten years). Instants and timestamps
/// this far out never overflow.
pub const MAX_PERIOD_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub password: PasswordConfig,
	pub session: SessionConfig,
	pub rate_limit: RateLimitConfig,
	pub audit: AuditConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`BASTION_*`)
/// 2. Config file (`/etc/bastion/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		database: layer.database.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		password: layer.password.unwrap_or_default().finalize(),
		session: layer.session.unwrap_or_default().finalize(),
		rate_limit: layer.rate_limit.unwrap_or_default().finalize(),
		audit: layer.audit.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		database = %config.database.url,
		password_algorithm = %config.password.algorithm,
		session_ttl_secs = config.session.ttl_secs,
		max_failures = config.rate_limit.max_failures,
		lockout_secs = config.rate_limit.lockout_secs,
		audit_enabled = config.audit.enabled,
		"configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	let password = &config.password;
	if password.min_length == 0 {
		return Err(ConfigError::section("password", "min_length must be at least 1"));
	}
	if password.min_length > password.max_length {
		return Err(ConfigError::section(
			"password",
			format!(
				"min_length ({}) exceeds max_length ({})",
				password.min_length, password.max_length
			),
		));
	}
	if password.iterations == 0 || password.parallelism == 0 {
		return Err(ConfigError::section(
			"password",
			"iterations and parallelism must be non-zero",
		));
	}
	let min_memory_kib = 8 * u64::from(password.parallelism);
	if u64::from(password.memory_kib) < min_memory_kib {
		return Err(ConfigError::section(
			"password",
			format!("memory_kib must be at least {min_memory_kib}"),
		));
	}
	if password.output_len < 4 {
		return Err(ConfigError::section("password", "output_len must be at least 4 bytes"));
	}

	if config.session.ttl_secs == 0 || config.session.cleanup_interval_secs == 0 {
		return Err(ConfigError::section(
			"session",
			"ttl_secs and cleanup_interval_secs must be non-zero",
		));
	}
	if config.session.ttl_secs > MAX_PERIOD_SECS
		|| config.session.cleanup_interval_secs > MAX_PERIOD_SECS
	{
		return Err(ConfigError::section(
			"session",
			format!("durations must not exceed {MAX_PERIOD_SECS} seconds"),
		));
	}

	let rate_limit = &config.rate_limit;
	if [
		u64::from(rate_limit.max_failures),
		rate_limit.window_secs,
		rate_limit.lockout_secs,
		rate_limit.idle_ttl_secs,
		rate_limit.cleanup_interval_secs,
	]
	.contains(&0)
	{
		return Err(ConfigError::section("rate_limit", "every value must be non-zero"));
	}
	if [
		rate_limit.window_secs,
		rate_limit.lockout_secs,
		rate_limit.idle_ttl_secs,
		rate_limit.cleanup_interval_secs,
	]
	.iter()
	.any(|secs| *secs > MAX_PERIOD_SECS)
	{
		return Err(ConfigError::section(
			"rate_limit",
			format!("durations must not exceed {MAX_PERIOD_SECS} seconds"),
		));
	}

	let sink_timeout_ms = config.audit.sink_timeout_ms;
	if sink_timeout_ms == 0 || sink_timeout_ms / 1000 > MAX_PERIOD_SECS {
		return Err(ConfigError::section(
			"audit",
			"sink_timeout_ms must be non-zero and at most ten years",
		));
	}

	Ok(())
}
