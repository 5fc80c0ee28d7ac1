// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Wrapper for credential material that must never reach a log line.
//!
//! Vault tokens, wrapping tokens and PEM private keys all travel through
//! [`Secret<T>`]. The wrapper:
//!
//! - prints `[REDACTED]` for both `Debug` and `Display`
//! - serializes as `"[REDACTED]"` unless a field opts in with [`serde_expose`]
//! - zeroizes its memory on drop
//! - hands out the inner value only through [`Secret::expose`]
//!
//! ```
//! use credmanager_common_secret::SecretString;
//!
//! let token = SecretString::new("hvs.CAESIJ".to_string());
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "hvs.CAESIJ");
//! ```

use std::fmt;
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A value that is redacted in every formatted representation.
///
/// There is no `Deref`; callers have to reach for [`Secret::expose`], which
/// keeps every read of a token or key visible in review.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

/// Tokens and PEM blocks are all strings.
pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Borrow the secret value.
	pub fn expose(&self) -> &T {
		&self.inner
	}

	pub fn expose_mut(&mut self) -> &mut T {
		&mut self.inner
	}

	/// Copy the value out. The original is still zeroized when dropped.
	pub fn into_inner(self) -> T
	where
		T: Clone,
	{
		self.inner.clone()
	}
}

impl SecretString {
	/// True when the wrapped string has no content once surrounding
	/// whitespace is removed. Token files frequently end with a newline.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}

	/// Returns a copy with surrounding whitespace removed.
	pub fn trimmed(&self) -> SecretString {
		Secret::new(self.inner.trim().to_string())
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Secret::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Secret::new(value.to_string())
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> Default for Secret<T>
where
	T: Zeroize + Default,
{
	fn default() -> Self {
		Self::new(T::default())
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

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

#[cfg(feature = "serde")]
mod serde_impl {
	use super::{Secret, REDACTED};
	use serde::{Deserialize, Deserializer, Serialize, Serializer};
	use zeroize::Zeroize;

	impl<T> Serialize for Secret<T>
	where
		T: Serialize + Zeroize,
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

/// Serializer for fields whose secret must go over the wire, such as the
/// `Token` field of an admission response.
///
/// ```
/// use credmanager_common_secret::SecretString;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Body {
/// 	#[serde(serialize_with = "credmanager_common_secret::serde_expose::serialize")]
/// 	token: SecretString,
/// }
///
/// let body = Body { token: SecretString::from("s.abc") };
/// assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"token":"s.abc"}"#);
/// ```
#[cfg(feature = "serde")]
pub mod serde_expose {
	use super::Secret;
	use serde::{Serialize, Serializer};
	use zeroize::Zeroize;

	pub fn serialize<T, S>(secret: &Secret<T>, serializer: S) -> Result<S::Ok, S::Error>
	where
		T: Serialize + Zeroize,
		S: Serializer,
	{
		secret.expose().serialize(serializer)
	}

	/// Variant for `Option<Secret<T>>` fields.
	pub fn serialize_option<T, S>(
		secret: &Option<Secret<T>>,
		serializer: S,
	) -> Result<S::Ok, S::Error>
	where
		T: Serialize + Zeroize,
		S: Serializer,
	{
		match secret {
			Some(secret) => serializer.serialize_some(secret.expose()),
			None => serializer.serialize_none(),
		}
	}
}
