// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Vault connection and issuance configuration section.

use credmanager_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VaultConfigLayer {
	pub address: Option<String>,
	pub token: Option<SecretString>,
	pub kv_mount: Option<String>,
	pub kv_version: Option<u8>,
	/// Token role the server issues node tokens from.
	pub token_role: Option<String>,
	pub wrap_ttl_secs: Option<u64>,
	pub policy_template_file: Option<PathBuf>,
	pub policy_prefix: Option<String>,
	pub role_prefix: Option<String>,
}

impl VaultConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.address.is_some() {
			self.address = other.address;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.kv_mount.is_some() {
			self.kv_mount = other.kv_mount;
		}
		if other.kv_version.is_some() {
			self.kv_version = other.kv_version;
		}
		if other.token_role.is_some() {
			self.token_role = other.token_role;
		}
		if other.wrap_ttl_secs.is_some() {
			self.wrap_ttl_secs = other.wrap_ttl_secs;
		}
		if other.policy_template_file.is_some() {
			self.policy_template_file = other.policy_template_file;
		}
		if other.policy_prefix.is_some() {
			self.policy_prefix = other.policy_prefix;
		}
		if other.role_prefix.is_some() {
			self.role_prefix = other.role_prefix;
		}
	}

	pub fn finalize(self) -> VaultConfig {
		let defaults = VaultConfig::default();
		VaultConfig {
			address: self.address.unwrap_or(defaults.address),
			token: self.token.filter(|t| !t.is_blank()).map(|t| t.trimmed()),
			kv_mount: self.kv_mount.unwrap_or(defaults.kv_mount),
			kv_version: self.kv_version.unwrap_or(defaults.kv_version),
			token_role: self.token_role.unwrap_or(defaults.token_role),
			wrap_ttl_secs: self.wrap_ttl_secs.unwrap_or(defaults.wrap_ttl_secs),
			policy_template_file: self.policy_template_file,
			policy_prefix: self.policy_prefix.unwrap_or(defaults.policy_prefix),
			role_prefix: self.role_prefix.unwrap_or(defaults.role_prefix),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultConfig {
	pub address: String,
	pub token: Option<SecretString>,
	pub kv_mount: String,
	pub kv_version: u8,
	pub token_role: String,
	pub wrap_ttl_secs: u64,
	/// Policy template; the built-in template is used when unset.
	pub policy_template_file: Option<PathBuf>,
	/// Node policies are named `<policy_prefix><node id>`.
	pub policy_prefix: String,
	/// A role's allowed policies live at
	/// `auth/token/roles/<role_prefix><node role>`.
	pub role_prefix: String,
}

impl VaultConfig {
	pub fn wrap_ttl(&self) -> Duration {
		Duration::from_secs(self.wrap_ttl_secs)
	}
}

impl Default for VaultConfig {
	fn default() -> Self {
		Self {
			address: "http://127.0.0.1:8200".to_string(),
			token: None,
			kv_mount: "secret".to_string(),
			kv_version: 2,
			token_role: "credmanager".to_string(),
			wrap_ttl_secs: 300,
			policy_template_file: None,
			policy_prefix: "credmanager-".to_string(),
			role_prefix: "credmanager-".to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = VaultConfigLayer::default().finalize();
		assert_eq!(config.kv_version, 2);
		assert_eq!(config.wrap_ttl(), Duration::from_secs(300));
		assert_eq!(config.policy_prefix, "credmanager-");
		assert!(config.token.is_none());
	}

	#[test]
	fn blank_token_is_unset() {
		let layer = VaultConfigLayer {
			token: Some(SecretString::from("  \n")),
			..Default::default()
		};
		assert!(layer.finalize().token.is_none());

		let layer = VaultConfigLayer {
			token: Some(SecretString::from("hvs.server\n")),
			..Default::default()
		};
		assert_eq!(layer.finalize().token.unwrap().expose(), "hvs.server");
	}
}
