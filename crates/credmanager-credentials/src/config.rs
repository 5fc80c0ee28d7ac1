// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Credential declarations.
//!
//! Every `*.toml` file in the daemon's credential directory may declare any
//! number of `[[ssh]]`, `[[pki]]`, `[[vault]]` and `[[template]]` tables.
//! Durations use humantime syntax (`"72h"`, `"30m"`).

use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{CredentialError, Result};
use crate::file::CredentialFile;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialConfigs {
	#[serde(default)]
	pub ssh: Vec<SshCertificateConfig>,
	#[serde(default)]
	pub pki: Vec<PkiCertificateConfig>,
	#[serde(default)]
	pub vault: Vec<VaultTokenConfig>,
	#[serde(default)]
	pub template: Vec<TemplateConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PkiMode {
	/// Key pair and CSR are generated locally, Vault only signs.
	#[default]
	Sign,
	/// Vault generates the key pair and returns it with the certificate.
	Issue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkiCertificateConfig {
	pub common_name: String,
	#[serde(default)]
	pub alt_names: Vec<String>,
	#[serde(default)]
	pub ip_sans: Vec<String>,
	#[serde(default = "default_pki_mount")]
	pub mount: String,
	pub role: String,
	#[serde(default)]
	pub mode: PkiMode,
	/// Requested lifetime. Zero lets the role decide.
	#[serde(default, deserialize_with = "deserialize_duration")]
	pub lifetime: Duration,
	pub ca_file: CredentialFile,
	pub certificate_file: CredentialFile,
	pub private_key_file: CredentialFile,
	/// systemd unit to reload or restart after renewal.
	#[serde(default)]
	pub notify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshCertificateConfig {
	pub public_key_file: PathBuf,
	pub certificate_file: CredentialFile,
	#[serde(default = "default_ssh_mount")]
	pub mount: String,
	pub role: String,
	#[serde(default)]
	pub principals: Vec<String>,
	#[serde(deserialize_with = "deserialize_duration")]
	pub lifetime: Duration,
	#[serde(default)]
	pub notify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultTokenConfig {
	pub policies: Vec<String>,
	pub role: String,
	pub token_file: CredentialFile,
	/// Upper bound on the renewal interval. Zero means "learn it from the
	/// first issued token".
	#[serde(default, deserialize_with = "deserialize_duration")]
	pub lifetime: Duration,
	#[serde(default)]
	pub notify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
	pub source: PathBuf,
	pub destination: CredentialFile,
	#[serde(default = "default_kv_mount")]
	pub kv_mount: String,
	#[serde(default = "default_kv_version")]
	pub kv_version: u8,
	#[serde(
		default = "default_poll_interval",
		deserialize_with = "deserialize_duration"
	)]
	pub poll_interval: Duration,
	#[serde(default)]
	pub notify: Option<String>,
}

fn default_pki_mount() -> String {
	"pki".to_string()
}

fn default_ssh_mount() -> String {
	"ssh".to_string()
}

fn default_kv_mount() -> String {
	"secret".to_string()
}

fn default_kv_version() -> u8 {
	2
}

fn default_poll_interval() -> Duration {
	Duration::from_secs(60)
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
	D: Deserializer<'de>,
{
	let text = String::deserialize(deserializer)?;
	humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

impl CredentialConfigs {
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn len(&self) -> usize {
		self.ssh.len() + self.pki.len() + self.vault.len() + self.template.len()
	}

	pub fn extend(&mut self, other: CredentialConfigs) {
		self.ssh.extend(other.ssh);
		self.pki.extend(other.pki);
		self.vault.extend(other.vault);
		self.template.extend(other.template);
	}

	/// Rejects declarations the renewal loop could not honour, including
	/// two credentials writing the same file.
	pub fn validate(&self) -> Result<()> {
		let mut outputs = HashSet::new();
		let mut claim = |file: &CredentialFile| -> Result<()> {
			if outputs.insert(file.path.clone()) {
				Ok(())
			} else {
				Err(CredentialError::Invalid(format!(
					"{} is written by more than one credential",
					file.path.display()
				)))
			}
		};

		for pki in &self.pki {
			if pki.common_name.trim().is_empty() {
				return Err(CredentialError::Invalid("pki: common_name is required".into()));
			}
			claim(&pki.ca_file)?;
			claim(&pki.certificate_file)?;
			claim(&pki.private_key_file)?;
		}
		for ssh in &self.ssh {
			if ssh.lifetime.is_zero() {
				return Err(CredentialError::Invalid(format!(
					"ssh: lifetime for {} must be positive",
					ssh.certificate_file.path.display()
				)));
			}
			claim(&ssh.certificate_file)?;
		}
		for vault in &self.vault {
			if vault.policies.is_empty() {
				return Err(CredentialError::Invalid(format!(
					"vault: no policies for {}",
					vault.token_file.path.display()
				)));
			}
			claim(&vault.token_file)?;
		}
		for template in &self.template {
			if credmanager_vault::KvVersion::from_number(template.kv_version).is_none() {
				return Err(CredentialError::Invalid(format!(
					"template: unsupported kv_version {}",
					template.kv_version
				)));
			}
			claim(&template.destination)?;
		}
		Ok(())
	}
}

pub fn parse_credential_config(path: &Path, content: &str) -> Result<CredentialConfigs> {
	toml::from_str(content).map_err(|source| CredentialError::Config {
		path: path.to_path_buf(),
		source,
	})
}

/// Loads every `*.toml` file in `dir`, in file-name order.
pub fn load_credential_configs(dir: &Path) -> Result<CredentialConfigs> {
	let entries = std::fs::read_dir(dir).map_err(|e| CredentialError::io(dir, e))?;
	let mut paths = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|e| CredentialError::io(dir, e))?;
		paths.push(entry.path());
	}
	paths.sort();

	let mut configs = CredentialConfigs::default();
	for path in paths {
		if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("toml") {
			debug!(path = %path.display(), "skipping non-TOML file in credential directory");
			continue;
		}
		let content = std::fs::read_to_string(&path).map_err(|e| CredentialError::io(&path, e))?;
		configs.extend(parse_credential_config(&path, &content)?);
	}
	configs.validate()?;
	Ok(configs)
}
