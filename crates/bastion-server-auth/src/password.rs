// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Password hashing, verification and algorithm migration.
//!
//! Hashes are stored as PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`),
//! which carry the variant, cost and salt. A hash produced under any earlier
//! policy therefore verifies without knowing that policy; [`PasswordPolicy::needs_rehash`]
//! tells the caller when to upgrade it.
//!
//! Everything here is CPU-bound. Callers on an async runtime should run
//! [`PasswordPolicy::hash`] and [`PasswordPolicy::verify`] on a blocking thread.

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::{
	rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use bastion_common_secret::SecretString;
use bastion_server_config::{HashAlgorithm, PasswordConfig};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Identifier stored next to each hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
	Argon2id,
	Argon2i,
	Argon2d,
}

impl PasswordAlgorithm {
	pub fn as_str(&self) -> &'static str {
		match self {
			PasswordAlgorithm::Argon2id => "argon2id",
			PasswordAlgorithm::Argon2i => "argon2i",
			PasswordAlgorithm::Argon2d => "argon2d",
		}
	}

	fn argon2_variant(self) -> Algorithm {
		match self {
			PasswordAlgorithm::Argon2id => Algorithm::Argon2id,
			PasswordAlgorithm::Argon2i => Algorithm::Argon2i,
			PasswordAlgorithm::Argon2d => Algorithm::Argon2d,
		}
	}
}

impl fmt::Display for PasswordAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PasswordAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"argon2id" => Ok(PasswordAlgorithm::Argon2id),
			"argon2i" => Ok(PasswordAlgorithm::Argon2i),
			"argon2d" => Ok(PasswordAlgorithm::Argon2d),
			other => Err(format!("unknown password algorithm: {other}")),
		}
	}
}

impl From<HashAlgorithm> for PasswordAlgorithm {
	fn from(algorithm: HashAlgorithm) -> Self {
		match algorithm {
			HashAlgorithm::Argon2id => PasswordAlgorithm::Argon2id,
			HashAlgorithm::Argon2i => PasswordAlgorithm::Argon2i,
			HashAlgorithm::Argon2d => PasswordAlgorithm::Argon2d,
		}
	}
}

/// Output of [`PasswordPolicy::hash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
	/// PHC string.
	pub hash: String,
	pub algorithm: PasswordAlgorithm,
}

/// Length bounds plus the algorithm and cost used for new hashes.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
	min_length: usize,
	max_length: usize,
	algorithm: PasswordAlgorithm,
	params: Params,
}

impl PasswordPolicy {
	pub fn from_config(config: &PasswordConfig) -> Result<Self, AuthError> {
		let params = Params::new(
			config.memory_kib,
			config.iterations,
			config.parallelism,
			Some(config.output_len),
		)
		.map_err(|e| AuthError::Hashing(format!("invalid argon2 parameters: {e}")))?;

		Ok(Self {
			min_length: config.min_length,
			max_length: config.max_length,
			algorithm: config.algorithm.into(),
			params,
		})
	}

	pub fn algorithm(&self) -> PasswordAlgorithm {
		self.algorithm
	}

	pub fn min_length(&self) -> usize {
		self.min_length
	}

	pub fn max_length(&self) -> usize {
		self.max_length
	}

	/// Length is counted in characters, not bytes.
	pub fn check_length(&self, secret: &str) -> Result<(), AuthError> {
		let length = secret.chars().count();
		if length < self.min_length {
			return Err(AuthError::PasswordTooShort {
				min: self.min_length,
			});
		}
		if length > self.max_length {
			return Err(AuthError::PasswordTooLong {
				max: self.max_length,
			});
		}
		Ok(())
	}

	fn hasher(&self) -> Argon2<'static> {
		Argon2::new(
			self.algorithm.argon2_variant(),
			Version::V0x13,
			self.params.clone(),
		)
	}

	/// Hash a new secret with a fresh salt.
	#[tracing::instrument(skip(self, secret), fields(algorithm = %self.algorithm))]
	pub fn hash(&self, secret: &SecretString) -> Result<HashedPassword, AuthError> {
		self.check_length(secret.expose())?;

		let salt = SaltString::generate(&mut OsRng);
		let hash = self
			.hasher()
			.hash_password(secret.expose().as_bytes(), &salt)
			.map_err(|e| AuthError::Hashing(e.to_string()))?
			.to_string();

		Ok(HashedPassword {
			hash,
			algorithm: self.algorithm,
		})
	}

	/// Check a presented secret against a stored hash.
	///
	/// Uses the variant and cost recorded in the hash, not the current
	/// policy. The digest comparison inside `password-hash` is constant-time.
	/// Secrets above the current maximum length are refused without hashing.
	pub fn verify(
		&self,
		secret: &SecretString,
		stored_hash: &str,
		algorithm: PasswordAlgorithm,
	) -> bool {
		if secret.expose().chars().count() > self.max_length {
			return false;
		}

		let parsed = match PasswordHash::new(stored_hash) {
			Ok(parsed) => parsed,
			Err(e) => {
				tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
				return false;
			}
		};

		if parsed.algorithm.as_str() != algorithm.as_str() {
			tracing::warn!(
				stored = parsed.algorithm.as_str(),
				recorded = %algorithm,
				"password hash does not match its recorded algorithm"
			);
			return false;
		}

		Argon2::default()
			.verify_password(secret.expose().as_bytes(), &parsed)
			.is_ok()
	}

	/// Whether a stored hash was produced under a different variant or cost.
	pub fn needs_rehash(&self, stored_hash: &str, algorithm: PasswordAlgorithm) -> bool {
		if algorithm != self.algorithm {
			return true;
		}
		let Ok(parsed) = PasswordHash::new(stored_hash) else {
			return true;
		};
		let Ok(stored) = Params::try_from(&parsed) else {
			return true;
		};
		let stored_len = parsed.hash.map(|output| output.len());

		stored.m_cost() != self.params.m_cost()
			|| stored.t_cost() != self.params.t_cost()
			|| stored.p_cost() != self.params.p_cost()
			|| stored_len != self.params.output_len()
	}
}

#[cfg(test)]
pub(crate) fn cheap_config() -> PasswordConfig {
	PasswordConfig {
		min_length: 8,
		max_length: 64,
		memory_kib: 256,
		iterations: 1,
		parallelism: 1,
		..PasswordConfig::default()
	}
}
