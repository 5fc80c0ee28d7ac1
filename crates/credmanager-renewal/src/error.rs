// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::credential::BoxError;

/// Messages carried on a renewer's error channel.
#[derive(Debug, Error)]
pub enum RenewError {
	#[error("error renewing {credential}: {source}")]
	Renew {
		credential: String,
		#[source]
		source: BoxError,
	},

	/// The credential was renewed but its consumer was not notified.
	#[error("error while executing post renew action for {credential}: {source}")]
	PostRenewAction {
		credential: String,
		#[source]
		source: BoxError,
	},

	/// Sent once when consecutive failures first exceed the maximum.
	#[error("exceeded maximum allowed retries ({max_retries}): credential: {credential}")]
	MaxRetriesExceeded { max_retries: u32, credential: String },

	#[error("error rendering {credential}: {source}")]
	Render {
		credential: String,
		#[source]
		source: BoxError,
	},
}

impl RenewError {
	pub fn credential(&self) -> &str {
		match self {
			RenewError::Renew { credential, .. }
			| RenewError::PostRenewAction { credential, .. }
			| RenewError::MaxRetriesExceeded { credential, .. }
			| RenewError::Render { credential, .. } => credential,
		}
	}

	/// True for errors after which the credential can no longer be trusted
	/// to stay valid.
	pub fn is_terminal(&self) -> bool {
		matches!(self, RenewError::MaxRetriesExceeded { .. })
	}
}
