// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use credmanager_renewal::{BoxError, RenewableCredential};
use credmanager_vault::{VaultApi, VaultError};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::SshCertificateConfig;
use crate::error::{CredentialError, Result};

/// A host certificate for the machine's existing SSH key.
///
/// The key pair is never regenerated; only the signed certificate is
/// written.
pub struct SshHostCertificate {
	config: SshCertificateConfig,
	vault: Arc<dyn VaultApi>,
}

impl SshHostCertificate {
	pub fn new(config: SshCertificateConfig, vault: Arc<dyn VaultApi>) -> Self {
		Self { config, vault }
	}

	#[instrument(skip(self), fields(public_key = %self.config.public_key_file.display()))]
	async fn sign(&self) -> Result<String> {
		let public_key = tokio::fs::read_to_string(&self.config.public_key_file)
			.await
			.map_err(|e| CredentialError::io(&self.config.public_key_file, e))?;

		let path = format!("{}/sign/{}", self.config.mount, self.config.role);
		let body = json!({
			"public_key": public_key.trim(),
			"cert_type": "host",
			"valid_principals": self.config.principals.join(","),
			"ttl": format!("{}s", self.config.lifetime.as_secs()),
		});
		let secret = self
			.vault
			.write(&path, body)
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(path.clone()))?;
		Ok(secret.data_str(&path, "signed_key")?.to_string())
	}
}

#[async_trait]
impl RenewableCredential for SshHostCertificate {
	async fn renew(&mut self) -> std::result::Result<(), BoxError> {
		let signed = self.sign().await?;
		let file = &self.config.certificate_file;
		file.write(&signed)
			.map_err(|e| CredentialError::io(&file.path, e))?;
		info!(path = %file.path.display(), "SSH host certificate written");
		Ok(())
	}

	fn max_renew_interval(&self) -> Duration {
		self.config.lifetime
	}
}

impl fmt::Display for SshHostCertificate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"SSH Host Certificate Credential -- PublicKey: {} -- LeaseDuration: {}",
			self.config.public_key_file.display(),
			humantime::format_duration(self.config.lifetime)
		)
	}
}
