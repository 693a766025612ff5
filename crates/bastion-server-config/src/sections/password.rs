// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password policy configuration: length bounds and hashing cost.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_LENGTH: usize = 12;
pub const DEFAULT_MAX_LENGTH: usize = 128;
pub const DEFAULT_MEMORY_KIB: u32 = 65536;
pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_PARALLELISM: u32 = 1;
pub const DEFAULT_OUTPUT_LEN: usize = 32;

/// Hash function used for newly stored passwords.
///
/// Older hashes produced under a different variant or cost remain
/// verifiable; the variant is recorded in each stored hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
	#[default]
	Argon2id,
	Argon2i,
	Argon2d,
}

impl fmt::Display for HashAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			HashAlgorithm::Argon2id => "argon2id",
			HashAlgorithm::Argon2i => "argon2i",
			HashAlgorithm::Argon2d => "argon2d",
		};
		f.write_str(name)
	}
}

impl FromStr for HashAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"argon2id" => Ok(HashAlgorithm::Argon2id),
			"argon2i" => Ok(HashAlgorithm::Argon2i),
			"argon2d" => Ok(HashAlgorithm::Argon2d),
			other => Err(format!("unknown password hash algorithm '{other}'")),
		}
	}
}

/// Password configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasswordConfig {
	pub min_length: usize,
	pub max_length: usize,
	pub algorithm: HashAlgorithm,
	pub memory_kib: u32,
	pub iterations: u32,
	pub parallelism: u32,
	pub output_len: usize,
}

impl Default for PasswordConfig {
	fn default() -> Self {
		PasswordConfigLayer::default().finalize()
	}
}

/// Password configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordConfigLayer {
	#[serde(default)]
	pub min_length: Option<usize>,
	#[serde(default)]
	pub max_length: Option<usize>,
	#[serde(default)]
	pub algorithm: Option<HashAlgorithm>,
	#[serde(default)]
	pub memory_kib: Option<u32>,
	#[serde(default)]
	pub iterations: Option<u32>,
	#[serde(default)]
	pub parallelism: Option<u32>,
	#[serde(default)]
	pub output_len: Option<usize>,
}

impl PasswordConfigLayer {
	pub fn merge(&mut self, other: PasswordConfigLayer) {
		if other.min_length.is_some() {
			self.min_length = other.min_length;
		}
		if other.max_length.is_some() {
			self.max_length = other.max_length;
		}
		if other.algorithm.is_some() {
			self.algorithm = other.algorithm;
		}
		if other.memory_kib.is_some() {
			self.memory_kib = other.memory_kib;
		}
		if other.iterations.is_some() {
			self.iterations = other.iterations;
		}
		if other.parallelism.is_some() {
			self.parallelism = other.parallelism;
		}
		if other.output_len.is_some() {
			self.output_len = other.output_len;
		}
	}

	pub fn finalize(self) -> PasswordConfig {
		PasswordConfig {
			min_length: self.min_length.unwrap_or(DEFAULT_MIN_LENGTH),
			max_length: self.max_length.unwrap_or(DEFAULT_MAX_LENGTH),
			algorithm: self.algorithm.unwrap_or_default(),
			memory_kib: self.memory_kib.unwrap_or(DEFAULT_MEMORY_KIB),
			iterations: self.iterations.unwrap_or(DEFAULT_ITERATIONS),
			parallelism: self.parallelism.unwrap_or(DEFAULT_PARALLELISM),
			output_len: self.output_len.unwrap_or(DEFAULT_OUTPUT_LEN),
		}
	}
}
