// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Activation record and node inventory locations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActivationConfigLayer {
	/// KV path, relative to the mount, holding one record per node.
	pub base_path: Option<String>,
}

impl ActivationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.base_path.is_some() {
			self.base_path = other.base_path;
		}
	}

	pub fn finalize(self) -> ActivationConfig {
		ActivationConfig {
			base_path: self
				.base_path
				.unwrap_or_else(|| ActivationConfig::default().base_path),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivationConfig {
	pub base_path: String,
}

impl Default for ActivationConfig {
	fn default() -> Self {
		Self {
			base_path: "credmanager/nodes/bootable".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfigLayer {
	pub path: Option<PathBuf>,
}

impl InventoryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.path.is_some() {
			self.path = other.path;
		}
	}

	pub fn finalize(self) -> InventoryConfig {
		InventoryConfig {
			path: self.path.unwrap_or_else(|| InventoryConfig::default().path),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryConfig {
	pub path: PathBuf,
}

impl Default for InventoryConfig {
	fn default() -> Self {
		Self {
			path: PathBuf::from("/etc/credmanager/inventory.toml"),
		}
	}
}
