// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Something that can (re)issue itself.
///
/// `renew` must leave previously written material untouched until the
/// replacement has been fully obtained, so a failed attempt never corrupts
/// a credential that is still valid. `Display` names the credential in logs
/// and renewal reports.
#[async_trait]
pub trait RenewableCredential: fmt::Display + Send {
	async fn renew(&mut self) -> Result<(), BoxError>;

	/// Longest safe gap between renewals. Renewals happen at half of this.
	fn max_renew_interval(&self) -> Duration;
}

/// Side effect run after a successful renewal, such as reloading the
/// service that consumes the credential.
#[async_trait]
pub trait PostRenewAction: fmt::Debug + Send + Sync {
	async fn execute(&self) -> Result<(), BoxError>;
}

/// Report of one successful renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewOutput {
	pub source: String,
	pub message: Option<String>,
	pub renewal_time: DateTime<Utc>,
}

impl RenewOutput {
	pub fn new(source: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			message: None,
			renewal_time: Utc::now(),
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}

	pub fn at(mut self, time: DateTime<Utc>) -> Self {
		self.renewal_time = time;
		self
	}
}

impl fmt::Display for RenewOutput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.message {
			Some(message) => write!(
				f,
				"{} -- {} at {}",
				self.source,
				message,
				self.renewal_time.to_rfc3339()
			),
			None => write!(
				f,
				"{} renewed at: {}",
				self.source,
				self.renewal_time.to_rfc3339()
			),
		}
	}
}
