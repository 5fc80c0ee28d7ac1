// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client certificates for mutual TLS.

use reqwest::Identity;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid client certificate or key: {0}")]
	Identity(#[source] reqwest::Error),
}

/// Loads a PEM certificate chain and its PEM private key as one identity.
pub fn identity_from_pem_files(cert: &Path, key: &Path) -> Result<Identity, TlsError> {
	let read = |path: &Path| {
		std::fs::read(path).map_err(|source| TlsError::Io {
			path: path.to_path_buf(),
			source,
		})
	};
	let mut pem = read(key)?;
	pem.push(b'\n');
	pem.extend(read(cert)?);
	Identity::from_pem(&pem).map_err(TlsError::Identity)
}
