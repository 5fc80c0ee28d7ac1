// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Daemon configuration file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/credmanager/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid configuration: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
	/// Name sent to the admission server. Defaults to the machine hostname.
	#[serde(default = "default_hostname")]
	pub hostname: String,
	pub credential_config_dir: PathBuf,
	#[serde(default)]
	pub vault: VaultSection,
	#[serde(default)]
	pub admission: Option<AdmissionSection>,
	#[serde(default)]
	pub logging: LoggingSection,
	#[serde(default)]
	pub shutdown: ShutdownSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultSection {
	#[serde(default = "default_vault_address")]
	pub address: String,
	/// Pre-provisioned token, tried after `VAULT_TOKEN`.
	#[serde(default)]
	pub token_file: Option<PathBuf>,
	/// PEM certificate presented to Vault. Requires `client_key`.
	#[serde(default)]
	pub client_cert: Option<PathBuf>,
	#[serde(default)]
	pub client_key: Option<PathBuf>,
	/// Log in with the EC2 instance identity when no token is provisioned.
	#[serde(default)]
	pub ec2_login: Option<Ec2LoginSection>,
}

impl Default for VaultSection {
	fn default() -> Self {
		Self {
			address: default_vault_address(),
			token_file: None,
			client_cert: None,
			client_key: None,
			ec2_login: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ec2LoginSection {
	/// Role configured on Vault's AWS auth mount.
	pub role: String,
	#[serde(default)]
	pub nonce: Option<String>,
	#[serde(default = "default_metadata_url")]
	pub metadata_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionSection {
	pub server_url: String,
	/// Where the token obtained from the admission server is cached.
	#[serde(default = "default_admission_token_file")]
	pub token_file: PathBuf,
	#[serde(default)]
	pub policies: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
	#[serde(default = "default_log_level")]
	pub level: String,
	#[serde(default)]
	pub format: LogFormat,
}

impl Default for LoggingSection {
	fn default() -> Self {
		Self {
			level: default_log_level(),
			format: LogFormat::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownSection {
	#[serde(default = "default_grace_period_secs")]
	pub grace_period_secs: u64,
}

impl Default for ShutdownSection {
	fn default() -> Self {
		Self {
			grace_period_secs: default_grace_period_secs(),
		}
	}
}

impl ShutdownSection {
	pub fn grace_period(&self) -> Duration {
		Duration::from_secs(self.grace_period_secs)
	}
}

fn default_hostname() -> String {
	hostname::get()
		.ok()
		.and_then(|name| name.into_string().ok())
		.unwrap_or_default()
}

fn default_vault_address() -> String {
	"http://127.0.0.1:8200".to_string()
}

fn default_metadata_url() -> String {
	credmanager_vault::DEFAULT_METADATA_URL.to_string()
}

fn default_admission_token_file() -> PathBuf {
	PathBuf::from("/etc/credmanager/vault-token")
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_grace_period_secs() -> u64 {
	10
}

impl DaemonConfig {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(path, &content)
	}

	pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
		let config: DaemonConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.hostname.trim().is_empty() {
			return Err(ConfigError::Invalid(
				"hostname is empty and could not be determined".to_string(),
			));
		}
		if self.vault.client_cert.is_some() != self.vault.client_key.is_some() {
			return Err(ConfigError::Invalid(
				"vault.client_cert and vault.client_key must be set together".to_string(),
			));
		}
		if let Some(ec2) = &self.vault.ec2_login {
			if ec2.role.trim().is_empty() {
				return Err(ConfigError::Invalid(
					"vault.ec2_login.role must not be empty".to_string(),
				));
			}
		}
		if let Some(admission) = &self.admission {
			if admission.server_url.trim().is_empty() {
				return Err(ConfigError::Invalid(
					"admission.server_url must not be empty".to_string(),
				));
			}
		}
		Ok(())
	}
}
