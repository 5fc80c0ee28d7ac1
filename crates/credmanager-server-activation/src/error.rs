// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use credmanager_vault::VaultError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActivationError>;

#[derive(Debug, Error)]
pub enum ActivationError {
	#[error(transparent)]
	Vault(#[from] VaultError),

	#[error("corrupt activation record for {key}: {source}")]
	Decode {
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid node key {0:?}")]
	InvalidKey(String),

	#[error("activation ttl must be positive")]
	InvalidTtl,
}
