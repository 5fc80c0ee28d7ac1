// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// One node's admission window.
///
/// Stored as `{"ttl": "15m", "created": "<RFC 3339>", "skip_deactivation": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
	#[serde(serialize_with = "serialize_ttl", deserialize_with = "deserialize_ttl")]
	pub ttl: Duration,
	pub created: DateTime<Utc>,
	#[serde(default)]
	pub skip_deactivation: bool,
}

fn serialize_ttl<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.collect_str(&humantime::format_duration(*ttl))
}

fn deserialize_ttl<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
	let text = String::deserialize(deserializer)?;
	humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

impl ActivationRecord {
	pub fn new(ttl: Duration, created: DateTime<Utc>) -> Self {
		Self {
			ttl,
			created,
			skip_deactivation: false,
		}
	}

	pub fn replayable(mut self) -> Self {
		self.skip_deactivation = true;
		self
	}

	/// `None` when the ttl does not fit a timestamp.
	pub fn expiration(&self) -> Option<DateTime<Utc>> {
		let ttl = chrono::Duration::from_std(self.ttl).ok()?;
		self.created.checked_add_signed(ttl)
	}

	/// True iff `ttl > 0` and `created <= now < created + ttl`.
	pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
		if self.ttl.is_zero() || now < self.created {
			return false;
		}
		self.expiration().is_some_and(|expiration| now < expiration)
	}
}

impl fmt::Display for ActivationRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"ttl={} created={}",
			humantime::format_duration(self.ttl),
			self.created.to_rfc3339()
		)?;
		if let Some(expiration) = self.expiration() {
			write!(f, " expires={}", expiration.to_rfc3339())?;
		}
		write!(f, " skip_deactivation={}", self.skip_deactivation)
	}
}
