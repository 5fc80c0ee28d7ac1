// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use credmanager_common_secret::SecretString;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, VaultError};

/// The `data` object of a Vault response.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// A decoded Vault response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultSecret {
	#[serde(default)]
	pub request_id: String,
	#[serde(default)]
	pub lease_id: String,
	#[serde(default)]
	pub lease_duration: u64,
	#[serde(default)]
	pub renewable: bool,
	#[serde(default)]
	pub data: Option<Data>,
	#[serde(default)]
	pub auth: Option<SecretAuth>,
	#[serde(default)]
	pub wrap_info: Option<WrapInfo>,
	#[serde(default)]
	pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretAuth {
	pub client_token: SecretString,
	#[serde(default)]
	pub accessor: String,
	#[serde(default)]
	pub policies: Vec<String>,
	#[serde(default)]
	pub lease_duration: u64,
	#[serde(default)]
	pub renewable: bool,
}

impl SecretAuth {
	pub fn lease(&self) -> Duration {
		Duration::from_secs(self.lease_duration)
	}
}

/// Response-wrapping envelope. `token` can be unwrapped exactly once.
#[derive(Debug, Clone, Deserialize)]
pub struct WrapInfo {
	pub token: SecretString,
	#[serde(default)]
	pub accessor: String,
	#[serde(default)]
	pub ttl: u64,
	#[serde(default)]
	pub creation_time: String,
	#[serde(default)]
	pub creation_path: String,
}

/// Body of `sys/health`, which is not wrapped in the usual envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
	#[serde(default)]
	pub initialized: bool,
	#[serde(default)]
	pub sealed: bool,
	#[serde(default)]
	pub standby: bool,
	#[serde(default)]
	pub version: String,
}

impl VaultSecret {
	/// The `data` object, failing if Vault returned none.
	pub fn data(&self, path: &str) -> Result<&Data> {
		self.data.as_ref().ok_or_else(|| VaultError::MissingField {
			path: path.to_string(),
			field: "data".to_string(),
		})
	}

	/// A required string field of `data`.
	pub fn data_str(&self, path: &str, field: &str) -> Result<&str> {
		self.data(path)?
			.get(field)
			.and_then(|v| v.as_str())
			.ok_or_else(|| VaultError::MissingField {
				path: path.to_string(),
				field: format!("data.{field}"),
			})
	}

	pub fn into_auth(self, path: &str) -> Result<SecretAuth> {
		self.auth.ok_or_else(|| VaultError::MissingField {
			path: path.to_string(),
			field: "auth".to_string(),
		})
	}

	pub fn into_wrap_info(self, path: &str) -> Result<WrapInfo> {
		self.wrap_info.ok_or_else(|| VaultError::MissingField {
			path: path.to_string(),
			field: "wrap_info".to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_token_create_response() {
		let body = r#"{
			"request_id": "f00",
			"lease_duration": 0,
			"renewable": false,
			"data": null,
			"auth": {
				"client_token": "hvs.abc",
				"accessor": "acc",
				"policies": ["default", "credmanager-n1"],
				"lease_duration": 3600,
				"renewable": true
			}
		}"#;
		let secret: VaultSecret = serde_json::from_str(body).unwrap();
		assert!(secret.data.is_none());
		let auth = secret.into_auth("auth/token/create").unwrap();
		assert_eq!(auth.client_token.expose(), "hvs.abc");
		assert_eq!(auth.lease(), Duration::from_secs(3600));
		assert_eq!(auth.policies, vec!["default", "credmanager-n1"]);
	}

	#[test]
	fn missing_fields_are_reported_with_path() {
		let secret: VaultSecret = serde_json::from_str(r#"{"data":{"a":1}}"#).unwrap();
		let err = secret.data_str("pki/sign/web", "certificate").unwrap_err();
		assert_eq!(
			err.to_string(),
			"Vault response for pki/sign/web is missing data.certificate"
		);
		assert!(secret.into_wrap_info("x").is_err());
	}
}
