// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use credmanager_vault::VaultError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CredentialError>;

#[derive(Debug, Error)]
pub enum CredentialError {
	#[error(transparent)]
	Vault(#[from] VaultError),

	#[error("I/O error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Config {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid credential configuration: {0}")]
	Invalid(String),

	#[error("failed to build certificate signing request: {0}")]
	Csr(#[from] rcgen::Error),

	#[error("certificate from {path} expired at {expiration}")]
	Expired { path: String, expiration: i64 },

	#[error("template error: {0}")]
	Template(String),
}

impl CredentialError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}
}
