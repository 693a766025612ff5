// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core identifiers and the fixed role set.
//!
//! All ID types serialize transparently as UUID strings and convert to and
//! from [`uuid::Uuid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(AccountId, "Unique identifier for an account.");
define_id_type!(SessionId, "Unique identifier for a session.");
define_id_type!(CredentialId, "Unique identifier for a stored hardware credential handle.");

// =============================================================================
// Roles
// =============================================================================

/// The fixed role set.
///
/// Roles form a strict ladder: each role satisfies its own requirement and
/// every requirement below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Read-only access to the admin surface.
	Viewer,
	/// Manages game content (codes, offers, notices).
	Operator,
	/// Full access, including account and role management.
	Administrator,
}

impl Role {
	pub const ALL: [Role; 3] = [Role::Viewer, Role::Operator, Role::Administrator];

	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Viewer => "viewer",
			Role::Operator => "operator",
			Role::Administrator => "administrator",
		}
	}

	/// Whether holding `self` satisfies a requirement for `required`.
	pub fn satisfies(&self, required: Role) -> bool {
		*self >= required
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"viewer" => Ok(Role::Viewer),
			"operator" => Ok(Role::Operator),
			"administrator" | "admin" => Ok(Role::Administrator),
			other => Err(format!("unknown role: {other}")),
		}
	}
}
