// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Why configuration could not be loaded. Every variant names where the
/// bad value came from.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("environment variable {var}: {message}")]
	BadEnvVar { var: String, message: String },

	#[error("cannot read {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{path} is not valid TOML: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("[{section}] {message}")]
	Section {
		section: &'static str,
		message: String,
	},
}

impl ConfigError {
	pub(crate) fn section(section: &'static str, message: impl Into<String>) -> Self {
		Self::Section {
			section,
			message: message.into(),
		}
	}
}
