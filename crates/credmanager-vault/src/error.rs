// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("invalid Vault address: {0}")]
	Url(#[from] url::ParseError),

	/// Vault answered with a non-success status.
	#[error("Vault returned {status} for {path}: {}", .errors.join("; "))]
	Api {
		status: u16,
		path: String,
		errors: Vec<String>,
	},

	#[error("failed to decode Vault response for {path}: {source}")]
	Decode {
		path: String,
		#[source]
		source: serde_json::Error,
	},

	/// Vault returned no body where one was required.
	#[error("empty response from Vault for {0}")]
	EmptyResponse(String),

	#[error("Vault response for {path} is missing {field}")]
	MissingField { path: String, field: String },

	#[error("Vault is not ready (status {status}, initialized: {initialized}, sealed: {sealed})")]
	Unhealthy {
		status: u16,
		initialized: bool,
		sealed: bool,
	},

	#[error("failed to fetch EC2 instance identity: {0}")]
	InstanceIdentity(String),
}

impl VaultError {
	pub fn status(&self) -> Option<u16> {
		match self {
			VaultError::Api { status, .. } | VaultError::Unhealthy { status, .. } => Some(*status),
			VaultError::Http(err) => err.status().map(|s| s.as_u16()),
			_ => None,
		}
	}

	/// Permission denied or unknown token.
	pub fn is_forbidden(&self) -> bool {
		self.status() == Some(403)
	}

	pub fn is_not_found(&self) -> bool {
		self.status() == Some(404)
	}
}
