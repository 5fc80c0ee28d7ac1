// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use credmanager_common_secret::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	ActivationConfigLayer, AdmissionConfigLayer, HttpConfigLayer, InventoryConfigLayer, LogFormat,
	LoggingConfigLayer, ShutdownConfigLayer, VaultConfigLayer,
};

/// Default location of the server configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/credmanager/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// A TOML file. A missing file contributes nothing.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variables.
///
/// Convention: `CREDMANAGER_SERVER_<SECTION>_<FIELD>`. Secrets also accept
/// `<NAME>_FILE` pointing at a file holding the value.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_env(&|name: &str| std::env::var(name).ok())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_var(lookup: Lookup<'_>, name: &str) -> Option<String> {
	lookup(name).filter(|s| !s.is_empty())
}

fn env_bool(lookup: Lookup<'_>, name: &str) -> Option<bool> {
	env_var(lookup, name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(
	lookup: Lookup<'_>,
	name: &str,
) -> Result<Option<T>, ConfigError> {
	match env_var(lookup, name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}'"),
		}),
		None => Ok(None),
	}
}

/// `NAME`, or the contents of the file named by `NAME_FILE`.
fn env_secret(lookup: Lookup<'_>, name: &str) -> Result<Option<SecretString>, ConfigError> {
	if let Some(value) = env_var(lookup, name) {
		return Ok(Some(SecretString::from(value)));
	}
	let file_var = format!("{name}_FILE");
	let Some(path) = env_var(lookup, &file_var) else {
		return Ok(None);
	};
	let content = std::fs::read_to_string(Path::new(&path))
		.map_err(|e| ConfigError::Secret(format!("{file_var}={path}: {e}")))?;
	Ok(Some(SecretString::from(content).trimmed()))
}

pub(crate) fn layer_from_env(lookup: Lookup<'_>) -> Result<ServerConfigLayer, ConfigError> {
	Ok(ServerConfigLayer {
		http: Some(HttpConfigLayer {
			host: env_var(lookup, "CREDMANAGER_SERVER_HOST"),
			port: env_parse(lookup, "CREDMANAGER_SERVER_PORT")?,
		}),
		vault: Some(VaultConfigLayer {
			address: env_var(lookup, "CREDMANAGER_SERVER_VAULT_ADDRESS"),
			token: env_secret(lookup, "CREDMANAGER_SERVER_VAULT_TOKEN")?,
			kv_mount: env_var(lookup, "CREDMANAGER_SERVER_VAULT_KV_MOUNT"),
			kv_version: env_parse(lookup, "CREDMANAGER_SERVER_VAULT_KV_VERSION")?,
			token_role: env_var(lookup, "CREDMANAGER_SERVER_VAULT_TOKEN_ROLE"),
			wrap_ttl_secs: env_parse(lookup, "CREDMANAGER_SERVER_VAULT_WRAP_TTL_SECS")?,
			policy_template_file: env_var(lookup, "CREDMANAGER_SERVER_VAULT_POLICY_TEMPLATE_FILE")
				.map(PathBuf::from),
			policy_prefix: env_var(lookup, "CREDMANAGER_SERVER_VAULT_POLICY_PREFIX"),
			role_prefix: env_var(lookup, "CREDMANAGER_SERVER_VAULT_ROLE_PREFIX"),
		}),
		activation: Some(ActivationConfigLayer {
			base_path: env_var(lookup, "CREDMANAGER_SERVER_ACTIVATION_BASE_PATH"),
		}),
		inventory: Some(InventoryConfigLayer {
			path: env_var(lookup, "CREDMANAGER_SERVER_INVENTORY_PATH").map(PathBuf::from),
		}),
		admission: Some(AdmissionConfigLayer {
			verify_source_ip: env_bool(lookup, "CREDMANAGER_SERVER_ADMISSION_VERIFY_SOURCE_IP"),
			catalog_address: env_var(lookup, "CREDMANAGER_SERVER_ADMISSION_CATALOG_ADDRESS"),
			reject_registered_nodes: env_bool(
				lookup,
				"CREDMANAGER_SERVER_ADMISSION_REJECT_REGISTERED_NODES",
			),
		}),
		logging: Some(LoggingConfigLayer {
			level: env_var(lookup, "CREDMANAGER_SERVER_LOG_LEVEL"),
			format: env_var(lookup, "CREDMANAGER_SERVER_LOG_FORMAT")
				.map(|v| {
					v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
						key: "CREDMANAGER_SERVER_LOG_FORMAT".to_string(),
						message,
					})
				})
				.transpose()?,
		}),
		shutdown: Some(ShutdownConfigLayer {
			grace_period_secs: env_parse(lookup, "CREDMANAGER_SERVER_SHUTDOWN_GRACE_PERIOD_SECS")?,
		}),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| map.get(name).cloned()
	}

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn missing_toml_file_is_empty_layer() {
		let layer = TomlSource::new("/nonexistent/credmanager/server.toml")
			.load()
			.unwrap();
		assert_eq!(layer, ServerConfigLayer::default());
	}

	#[test]
	fn invalid_toml_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("server.toml");
		std::fs::write(&path, "[http\nport = ").unwrap();
		assert!(matches!(
			TomlSource::new(&path).load(),
			Err(ConfigError::TomlParse { .. })
		));
	}

	#[test]
	fn env_values_are_parsed() {
		let lookup = lookup_from(&[
			("CREDMANAGER_SERVER_PORT", "9443"),
			("CREDMANAGER_SERVER_VAULT_TOKEN", "hvs.server"),
			("CREDMANAGER_SERVER_ADMISSION_VERIFY_SOURCE_IP", "false"),
			("CREDMANAGER_SERVER_LOG_FORMAT", "json"),
			("CREDMANAGER_SERVER_HOST", ""),
		]);
		let layer = layer_from_env(&lookup).unwrap();
		let http = layer.http.unwrap();
		assert_eq!(http.port, Some(9443));
		assert_eq!(http.host, None);
		assert_eq!(
			layer.vault.unwrap().token.unwrap().expose(),
			"hvs.server"
		);
		assert_eq!(layer.admission.unwrap().verify_source_ip, Some(false));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn env_rejects_bad_numbers() {
		let lookup = lookup_from(&[("CREDMANAGER_SERVER_PORT", "http")]);
		assert!(matches!(
			layer_from_env(&lookup),
			Err(ConfigError::InvalidValue { .. })
		));
	}

	#[test]
	fn secret_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("vault-token");
		std::fs::write(&path, "hvs.fromfile\n").unwrap();
		let path = path.to_string_lossy().to_string();

		let lookup = lookup_from(&[("CREDMANAGER_SERVER_VAULT_TOKEN_FILE", path.as_str())]);
		let layer = layer_from_env(&lookup).unwrap();
		assert_eq!(
			layer.vault.unwrap().token.unwrap().expose(),
			"hvs.fromfile"
		);

		let lookup = lookup_from(&[(
			"CREDMANAGER_SERVER_VAULT_TOKEN_FILE",
			"/nonexistent/vault-token",
		)]);
		assert!(matches!(
			layer_from_env(&lookup),
			Err(ConfigError::Secret(_))
		));
	}
}
