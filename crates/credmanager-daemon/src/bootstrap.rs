// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Where the daemon's own Vault token comes from.
//!
//! Sources are tried in order: the `VAULT_TOKEN` environment variable, the
//! configured token file, an EC2 instance-identity login when configured,
//! then the admission server.

use credmanager_common_core::TokenRequest;
use credmanager_common_secret::SecretString;
use credmanager_credentials::{ClientError, CredmanagerClient};
use credmanager_vault::{AwsAuth, Ec2Metadata, VaultApi, VaultError};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error(
		"no Vault token: set VAULT_TOKEN, vault.token_file, [vault.ec2_login] or an [admission] section"
	)]
	NoToken,

	#[error("EC2 instance-identity login failed: {0}")]
	Ec2Login(#[source] VaultError),

	#[error("failed to read token file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("admission failed: {0}")]
	Admission(#[from] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
	Environment,
	TokenFile,
	Ec2InstanceIdentity,
	Admission,
}

impl fmt::Display for TokenOrigin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TokenOrigin::Environment => write!(f, "{VAULT_TOKEN_ENV}"),
			TokenOrigin::TokenFile => write!(f, "token file"),
			TokenOrigin::Ec2InstanceIdentity => write!(f, "EC2 instance identity"),
			TokenOrigin::Admission => write!(f, "admission server"),
		}
	}
}

/// Admission client plus the request it sends.
pub struct Admission {
	pub client: CredmanagerClient,
	pub request: TokenRequest,
}

/// Instance metadata source plus the AWS auth role to log in as.
pub struct Ec2Login {
	pub metadata: Ec2Metadata,
	pub role: String,
	pub nonce: Option<String>,
}

pub struct TokenChain {
	env_token: Option<String>,
	token_file: Option<PathBuf>,
	ec2_login: Option<Ec2Login>,
	admission: Option<Admission>,
}

impl TokenChain {
	pub fn new(
		env_token: Option<String>,
		token_file: Option<PathBuf>,
		admission: Option<Admission>,
	) -> Self {
		Self {
			env_token,
			token_file,
			ec2_login: None,
			admission,
		}
	}

	pub fn with_ec2_login(mut self, login: Option<Ec2Login>) -> Self {
		self.ec2_login = login;
		self
	}

	/// Reads `VAULT_TOKEN` from the process environment.
	pub fn from_env(token_file: Option<PathBuf>, admission: Option<Admission>) -> Self {
		Self::new(std::env::var(VAULT_TOKEN_ENV).ok(), token_file, admission)
	}

	fn file_token(path: &Path) -> Result<Option<SecretString>, BootstrapError> {
		match std::fs::read_to_string(path) {
			Ok(content) => {
				let token = SecretString::from(content).trimmed();
				Ok((!token.is_blank()).then_some(token))
			}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(source) => Err(BootstrapError::Io {
				path: path.to_path_buf(),
				source,
			}),
		}
	}

	/// First token available. `vault` is only used for requests that need
	/// no token of their own: the EC2 login and unwrapping an admission
	/// response.
	pub async fn resolve(
		&self,
		vault: &dyn VaultApi,
	) -> Result<(SecretString, TokenOrigin), BootstrapError> {
		if let Some(token) = self.env_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
			info!(origin = %TokenOrigin::Environment, "using Vault token");
			return Ok((SecretString::from(token), TokenOrigin::Environment));
		}

		if let Some(path) = &self.token_file {
			if let Some(token) = Self::file_token(path)? {
				info!(origin = %TokenOrigin::TokenFile, path = %path.display(), "using Vault token");
				return Ok((token, TokenOrigin::TokenFile));
			}
			debug!(path = %path.display(), "token file missing or empty");
		}

		if let Some(login) = &self.ec2_login {
			let pkcs7 = login.metadata.pkcs7().await.map_err(BootstrapError::Ec2Login)?;
			let auth = AwsAuth::new(vault)
				.login_ec2(&pkcs7, &login.role, login.nonce.as_deref())
				.await
				.map_err(BootstrapError::Ec2Login)?;
			info!(origin = %TokenOrigin::Ec2InstanceIdentity, role = %login.role, "using Vault token");
			return Ok((auth.client_token, TokenOrigin::Ec2InstanceIdentity));
		}

		if let Some(admission) = &self.admission {
			let token = admission.client.get_token(&admission.request, vault).await?;
			info!(origin = %TokenOrigin::Admission, "using Vault token");
			return Ok((token, TokenOrigin::Admission));
		}

		Err(BootstrapError::NoToken)
	}
}
