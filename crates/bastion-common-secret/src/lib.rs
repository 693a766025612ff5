// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for credential material: passwords, session tokens, CSRF tokens.
//!
//! A [`Secret<T>`]:
//!
//! - prints as `[REDACTED]` through Debug, Display and Serialize
//! - is zeroed in memory when dropped
//! - only yields its value through an explicit [`Secret::expose`] call
//! - compares in constant time, so equality checks on presented tokens do
//!   not leak how many leading bytes matched
//!
//! ```
//! use bastion_common_secret::SecretString;
//!
//! let password = SecretString::from("correct horse battery staple");
//! assert_eq!(format!("{password}"), "[REDACTED]");
//! assert_eq!(password.expose(), "correct horse battery staple");
//! ```

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder written wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A value that must never reach logs, audit metadata or serialized output.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Secret text: plaintext passwords and bearer tokens.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the protected value. Every call site is a place where the
	/// secret leaves the wrapper, so keep them few and obvious.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	/// Copy the value out. The wrapper keeps (and later zeroes) its own copy.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl<T> Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	/// Constant-time comparison against raw bytes.
	pub fn ct_eq_bytes(&self, other: &[u8]) -> bool {
		self.inner.as_ref().ct_eq(other).into()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.as_ref().is_empty()
	}
}

impl From<String> for Secret<String> {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for Secret<String> {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

// subtle returns false early on length mismatch; lengths of tokens are public.
impl<T> PartialEq for Secret<T>
where
	T: Zeroize + AsRef<[u8]>,
{
	fn eq(&self, other: &Self) -> bool {
		self.ct_eq_bytes(other.inner.as_ref())
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + AsRef<[u8]> {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Zeroize,
	{
		fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
		where
			S: Serializer,
		{
			serializer.serialize_str(REDACTED)
		}
	}

	impl<'de, T> Deserialize<'de> for Secret<T>
	where
		T: Deserialize<'de> + Zeroize,
	{
		fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
		where
			D: Deserializer<'de>,
		{
			T::deserialize(deserializer).map(Secret::new)
		}
	}
}
