// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit log configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SINK_TIMEOUT_MS: u64 = 2_000;

/// Minimum severity an entry needs to reach the configured sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverityLevel {
	Debug,
	#[default]
	Info,
	Notice,
	Warning,
	Critical,
}

impl fmt::Display for AuditSeverityLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverityLevel::Debug => "debug",
			AuditSeverityLevel::Info => "info",
			AuditSeverityLevel::Notice => "notice",
			AuditSeverityLevel::Warning => "warning",
			AuditSeverityLevel::Critical => "critical",
		};
		f.write_str(s)
	}
}

impl FromStr for AuditSeverityLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"debug" => Ok(AuditSeverityLevel::Debug),
			"info" => Ok(AuditSeverityLevel::Info),
			"notice" => Ok(AuditSeverityLevel::Notice),
			"warning" | "warn" => Ok(AuditSeverityLevel::Warning),
			"critical" => Ok(AuditSeverityLevel::Critical),
			other => Err(format!("unknown audit severity '{other}'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
	pub enabled: bool,
	pub min_severity: AuditSeverityLevel,
	/// Mirror entries into the tracing output.
	pub tracing_sink: bool,
	/// Longest a single sink may take to accept one entry.
	pub sink_timeout_ms: u64,
}

impl Default for AuditConfig {
	fn default() -> Self {
		AuditConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub min_severity: Option<AuditSeverityLevel>,
	#[serde(default)]
	pub tracing_sink: Option<bool>,
	#[serde(default)]
	pub sink_timeout_ms: Option<u64>,
}

impl AuditConfigLayer {
	pub fn merge(&mut self, other: AuditConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.min_severity.is_some() {
			self.min_severity = other.min_severity;
		}
		if other.tracing_sink.is_some() {
			self.tracing_sink = other.tracing_sink;
		}
		if other.sink_timeout_ms.is_some() {
			self.sink_timeout_ms = other.sink_timeout_ms;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			enabled: self.enabled.unwrap_or(true),
			min_severity: self.min_severity.unwrap_or_default(),
			tracing_sink: self.tracing_sink.unwrap_or(true),
			sink_timeout_ms: self.sink_timeout_ms.unwrap_or(DEFAULT_SINK_TIMEOUT_MS),
		}
	}
}
