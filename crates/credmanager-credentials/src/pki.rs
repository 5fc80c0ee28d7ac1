// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::Utc;
use credmanager_renewal::{BoxError, RenewableCredential};
use credmanager_vault::{VaultApi, VaultError, VaultSecret};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::{PkiCertificateConfig, PkiMode};
use crate::error::{CredentialError, Result};

/// An X.509 certificate from a Vault PKI mount.
pub struct PkiCertificate {
	config: PkiCertificateConfig,
	vault: Arc<dyn VaultApi>,
	interval: Duration,
}

#[derive(Debug)]
struct IssuedCertificate {
	certificate: String,
	issuing_ca: String,
	private_key: String,
	expiration: i64,
}

impl PkiCertificate {
	pub fn new(config: PkiCertificateConfig, vault: Arc<dyn VaultApi>) -> Self {
		let interval = config.lifetime;
		Self {
			config,
			vault,
			interval,
		}
	}

	pub fn config(&self) -> &PkiCertificateConfig {
		&self.config
	}

	fn request_body(&self, csr: Option<String>) -> Value {
		let mut body = Map::new();
		body.insert("common_name".into(), json!(self.config.common_name));
		if !self.config.alt_names.is_empty() {
			body.insert("alt_names".into(), json!(self.config.alt_names.join(",")));
		}
		if !self.config.ip_sans.is_empty() {
			body.insert("ip_sans".into(), json!(self.config.ip_sans.join(",")));
		}
		if !self.config.lifetime.is_zero() {
			body.insert(
				"ttl".into(),
				json!(format!("{}s", self.config.lifetime.as_secs())),
			);
		}
		if let Some(csr) = csr {
			body.insert("csr".into(), json!(csr));
		}
		Value::Object(body)
	}

	fn csr(&self) -> Result<(String, String)> {
		let key_pair = KeyPair::generate()?;
		let mut params = CertificateParams::default();
		let mut dn = DistinguishedName::new();
		dn.push(
			DnType::CommonName,
			DnValue::Utf8String(self.config.common_name.clone()),
		);
		params.distinguished_name = dn;
		let csr = params.serialize_request(&key_pair)?.pem()?;
		Ok((csr, key_pair.serialize_pem()))
	}

	#[instrument(skip(self), fields(common_name = %self.config.common_name))]
	async fn sign(&self) -> Result<IssuedCertificate> {
		let (csr, private_key) = self.csr()?;
		let path = format!("{}/sign/{}", self.config.mount, self.config.role);
		let secret = self.post(&path, self.request_body(Some(csr))).await?;
		Ok(IssuedCertificate {
			certificate: secret.data_str(&path, "certificate")?.to_string(),
			issuing_ca: secret.data_str(&path, "issuing_ca")?.to_string(),
			private_key,
			expiration: expiration(&secret, &path)?,
		})
	}

	#[instrument(skip(self), fields(common_name = %self.config.common_name))]
	async fn issue(&self) -> Result<IssuedCertificate> {
		let path = format!("{}/issue/{}", self.config.mount, self.config.role);
		let secret = self.post(&path, self.request_body(None)).await?;
		Ok(IssuedCertificate {
			certificate: secret.data_str(&path, "certificate")?.to_string(),
			issuing_ca: secret.data_str(&path, "issuing_ca")?.to_string(),
			private_key: secret.data_str(&path, "private_key")?.to_string(),
			expiration: expiration(&secret, &path)?,
		})
	}

	async fn post(&self, path: &str, body: Value) -> Result<VaultSecret> {
		self.vault
			.write(path, body)
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(path.to_string()).into())
	}

	/// Stages all three files before replacing any of them, so a failed
	/// write never pairs a new certificate with an old key.
	fn persist(&self, issued: &IssuedCertificate) -> Result<()> {
		let staged = [
			(&self.config.private_key_file, &issued.private_key),
			(&self.config.certificate_file, &issued.certificate),
			(&self.config.ca_file, &issued.issuing_ca),
		]
		.into_iter()
		.map(|(file, content)| {
			file.stage(content)
				.map_err(|e| CredentialError::io(&file.path, e))
		})
		.collect::<Result<Vec<_>>>()?;

		for file in staged {
			let target = file.target().to_path_buf();
			file.commit()
				.map_err(|e| CredentialError::io(&target, e))?;
		}
		Ok(())
	}
}

fn expiration(secret: &VaultSecret, path: &str) -> Result<i64> {
	secret
		.data(path)?
		.get("expiration")
		.and_then(Value::as_i64)
		.ok_or_else(|| {
			VaultError::MissingField {
				path: path.to_string(),
				field: "data.expiration".to_string(),
			}
			.into()
		})
}

#[async_trait]
impl RenewableCredential for PkiCertificate {
	async fn renew(&mut self) -> std::result::Result<(), BoxError> {
		let issued = match self.config.mode {
			PkiMode::Sign => self.sign().await?,
			PkiMode::Issue => self.issue().await?,
		};

		let remaining = issued.expiration - Utc::now().timestamp();
		if remaining <= 0 {
			return Err(CredentialError::Expired {
				path: format!("{}/{}", self.config.mount, self.config.role),
				expiration: issued.expiration,
			}
			.into());
		}

		self.persist(&issued)?;

		// Vault may cap the lifetime below what was requested.
		let lease = Duration::from_secs(remaining as u64);
		if lease != self.interval {
			debug!(
				requested = ?self.config.lifetime,
				actual = ?lease,
				"adjusting renewal interval to certificate expiration"
			);
		}
		self.interval = lease;
		info!(
			common_name = %self.config.common_name,
			expiration = issued.expiration,
			"certificate written"
		);
		Ok(())
	}

	fn max_renew_interval(&self) -> Duration {
		self.interval
	}
}

impl fmt::Display for PkiCertificate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "PKI Certificate for {}", self.config.common_name)
	}
}
