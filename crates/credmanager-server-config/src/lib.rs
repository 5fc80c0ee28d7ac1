// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the credmanager admission server.
//!
//! Layered sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`/etc/credmanager/server.toml` or an explicit path)
//! 3. Environment variables (`CREDMANAGER_SERVER_*`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub vault: VaultConfig,
	pub activation: ActivationConfig,
	pub inventory: InventoryConfig,
	pub admission: AdmissionConfig,
	pub logging: LoggingConfig,
	pub shutdown: ShutdownConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Loads configuration from the system config file and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Loads configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolves a merged layer, applying defaults and validation.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		vault: layer.vault.unwrap_or_default().finalize(),
		activation: layer.activation.unwrap_or_default().finalize(),
		inventory: layer.inventory.unwrap_or_default().finalize(),
		admission: layer.admission.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		shutdown: layer.shutdown.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		vault = %config.vault.address,
		kv_mount = %config.vault.kv_mount,
		token_role = %config.vault.token_role,
		verify_source_ip = config.admission.verify_source_ip,
		catalog_configured = config.admission.catalog_address.is_some(),
		"Server configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.vault.token.is_none() {
		return Err(ConfigError::Validation(
			"a Vault token is required: set vault.token, CREDMANAGER_SERVER_VAULT_TOKEN or \
			 CREDMANAGER_SERVER_VAULT_TOKEN_FILE"
				.to_string(),
		));
	}
	if !matches!(config.vault.kv_version, 1 | 2) {
		return Err(ConfigError::Validation(format!(
			"vault.kv_version must be 1 or 2, got {}",
			config.vault.kv_version
		)));
	}
	if config.vault.wrap_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"vault.wrap_ttl_secs must be positive".to_string(),
		));
	}
	if config.admission.reject_registered_nodes && config.admission.catalog_address.is_none() {
		return Err(ConfigError::Validation(
			"admission.reject_registered_nodes requires admission.catalog_address".to_string(),
		));
	}
	if config.activation.base_path.trim_matches('/').is_empty() {
		return Err(ConfigError::Validation(
			"activation.base_path must not be empty".to_string(),
		));
	}
	Ok(())
}
