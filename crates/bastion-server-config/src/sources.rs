// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuditConfigLayer, DatabaseConfigLayer, LoggingConfigLayer, PasswordConfigLayer,
	RateLimitConfigLayer, SessionConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/bastion/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: BASTION_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()?),
			logging: Some(load_logging_from_env()),
			password: Some(load_password_from_env()?),
			session: Some(load_session_from_env()?),
			rate_limit: Some(load_rate_limit_from_env()?),
			audit: Some(load_audit_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
{
	match env_var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::BadEnvVar {
			var: name.to_string(),
			message: format!("cannot parse '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("BASTION_DATABASE_URL"),
		max_connections: env_parse("BASTION_DATABASE_MAX_CONNECTIONS")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("BASTION_LOG_LEVEL"),
		json: env_bool("BASTION_LOG_JSON"),
	}
}

fn load_password_from_env() -> Result<PasswordConfigLayer, ConfigError> {
	Ok(PasswordConfigLayer {
		min_length: env_parse("BASTION_PASSWORD_MIN_LENGTH")?,
		max_length: env_parse("BASTION_PASSWORD_MAX_LENGTH")?,
		algorithm: env_parse("BASTION_PASSWORD_ALGORITHM")?,
		memory_kib: env_parse("BASTION_PASSWORD_MEMORY_KIB")?,
		iterations: env_parse("BASTION_PASSWORD_ITERATIONS")?,
		parallelism: env_parse("BASTION_PASSWORD_PARALLELISM")?,
		output_len: env_parse("BASTION_PASSWORD_OUTPUT_LEN")?,
	})
}

fn load_session_from_env() -> Result<SessionConfigLayer, ConfigError> {
	Ok(SessionConfigLayer {
		ttl_secs: env_parse("BASTION_SESSION_TTL_SECS")?,
		cleanup_interval_secs: env_parse("BASTION_SESSION_CLEANUP_INTERVAL_SECS")?,
	})
}

fn load_rate_limit_from_env() -> Result<RateLimitConfigLayer, ConfigError> {
	Ok(RateLimitConfigLayer {
		max_failures: env_parse("BASTION_RATE_LIMIT_MAX_FAILURES")?,
		window_secs: env_parse("BASTION_RATE_LIMIT_WINDOW_SECS")?,
		lockout_secs: env_parse("BASTION_RATE_LIMIT_LOCKOUT_SECS")?,
		idle_ttl_secs: env_parse("BASTION_RATE_LIMIT_IDLE_TTL_SECS")?,
		cleanup_interval_secs: env_parse("BASTION_RATE_LIMIT_CLEANUP_INTERVAL_SECS")?,
	})
}

fn load_audit_from_env() -> Result<AuditConfigLayer, ConfigError> {
	Ok(AuditConfigLayer {
		enabled: env_bool("BASTION_AUDIT_ENABLED"),
		min_severity: env_parse("BASTION_AUDIT_MIN_SEVERITY")?,
		tracing_sink: env_bool("BASTION_AUDIT_TRACING_SINK"),
		sink_timeout_ms: env_parse("BASTION_AUDIT_SINK_TIMEOUT_MS")?,
	})
}
