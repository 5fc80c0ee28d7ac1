// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Key/value secrets engine helper covering both KV v1 and v2 mounts.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::client::VaultApi;
use crate::error::Result;
use crate::types::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KvVersion {
	V1,
	#[default]
	V2,
}

impl KvVersion {
	pub fn from_number(version: u8) -> Option<Self> {
		match version {
			1 => Some(KvVersion::V1),
			2 => Some(KvVersion::V2),
			_ => None,
		}
	}
}

/// A KV mount. Keys are relative to the mount point.
#[derive(Clone)]
pub struct Kv {
	api: Arc<dyn VaultApi>,
	mount: String,
	version: KvVersion,
}

impl Kv {
	pub fn new(api: Arc<dyn VaultApi>, mount: impl Into<String>, version: KvVersion) -> Self {
		Self {
			api,
			mount: mount.into().trim_matches('/').to_string(),
			version,
		}
	}

	pub fn mount(&self) -> &str {
		&self.mount
	}

	pub fn version(&self) -> KvVersion {
		self.version
	}

	fn data_path(&self, key: &str) -> String {
		let key = key.trim_matches('/');
		match self.version {
			KvVersion::V1 => format!("{}/{}", self.mount, key),
			KvVersion::V2 => format!("{}/data/{}", self.mount, key),
		}
	}

	fn metadata_path(&self, key: &str) -> String {
		let key = key.trim_matches('/');
		match self.version {
			KvVersion::V1 => format!("{}/{}", self.mount, key),
			KvVersion::V2 => format!("{}/metadata/{}", self.mount, key),
		}
	}

	/// The current value at `key`. A v2 key whose latest version has been
	/// deleted reads as `None`.
	pub async fn read_latest(&self, key: &str) -> Result<Option<Data>> {
		let Some(secret) = self.api.read(&self.data_path(key)).await? else {
			return Ok(None);
		};
		let Some(data) = secret.data else {
			return Ok(None);
		};
		match self.version {
			KvVersion::V1 => Ok(Some(data)),
			KvVersion::V2 => match data.get("data") {
				Some(Value::Object(inner)) => Ok(Some(inner.clone())),
				_ => Ok(None),
			},
		}
	}

	pub async fn write(&self, key: &str, data: Data) -> Result<()> {
		let body = match self.version {
			KvVersion::V1 => Value::Object(data),
			KvVersion::V2 => json!({ "data": data }),
		};
		self.api.write(&self.data_path(key), body).await?;
		Ok(())
	}

	/// Deletes the latest version (v2) or the key itself (v1).
	pub async fn delete_latest(&self, key: &str) -> Result<()> {
		self.api.delete(&self.data_path(key)).await
	}

	pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
		self.api.list(&self.metadata_path(prefix)).await
	}
}

impl std::fmt::Debug for Kv {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Kv")
			.field("mount", &self.mount)
			.field("version", &self.version)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MemoryVault;

	fn record() -> Data {
		let mut data = Data::new();
		data.insert("ttl".to_string(), json!("1h"));
		data
	}

	#[tokio::test]
	async fn v2_round_trip_and_delete() {
		let vault = Arc::new(MemoryVault::new("root"));
		let kv = Kv::new(vault.clone(), "secret", KvVersion::V2);

		assert!(kv.read_latest("nodes/bootable/n1").await.unwrap().is_none());
		kv.write("nodes/bootable/n1", record()).await.unwrap();
		assert!(vault.contains("secret/data/nodes/bootable/n1"));

		let read = kv.read_latest("nodes/bootable/n1").await.unwrap().unwrap();
		assert_eq!(read.get("ttl"), Some(&json!("1h")));

		kv.delete_latest("nodes/bootable/n1").await.unwrap();
		assert!(kv.read_latest("nodes/bootable/n1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn v1_stores_data_directly() {
		let vault = Arc::new(MemoryVault::new("root"));
		let kv = Kv::new(vault.clone(), "/kv/", KvVersion::V1);
		kv.write("a", record()).await.unwrap();
		assert!(vault.contains("kv/a"));
		assert_eq!(
			kv.read_latest("a").await.unwrap().unwrap().get("ttl"),
			Some(&json!("1h"))
		);
	}

	#[test]
	fn version_numbers() {
		assert_eq!(KvVersion::from_number(1), Some(KvVersion::V1));
		assert_eq!(KvVersion::from_number(2), Some(KvVersion::V2));
		assert_eq!(KvVersion::from_number(3), None);
	}
}
