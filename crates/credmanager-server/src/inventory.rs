// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Known nodes.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::info;

static NODE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap());

#[derive(Debug, Error)]
pub enum InventoryError {
	#[error("no node with hostname {0}")]
	NotFound(String),

	#[error("failed to read inventory {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse inventory {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid inventory: {0}")]
	Invalid(String),
}

/// A machine allowed to request credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
	/// Stable identifier. Names the node's policy and activation record.
	pub id: String,
	pub hostname: String,
	#[serde(default)]
	pub ips: Vec<IpAddr>,
	pub role: String,
	#[serde(default)]
	pub system: String,
	#[serde(default)]
	pub attributes: BTreeMap<String, String>,
}

impl Node {
	/// Whether `addr` is one of the node's addresses. IPv4-mapped IPv6
	/// addresses match their IPv4 form.
	pub fn has_ip(&self, addr: IpAddr) -> bool {
		let addr = addr.to_canonical();
		self.ips.iter().any(|ip| ip.to_canonical() == addr)
	}
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
	async fn resolve(&self, hostname: &str) -> Result<Node, InventoryError>;
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct InventoryFile {
	#[serde(default, rename = "node")]
	nodes: Vec<Node>,
}

/// Inventory loaded once from a TOML file of `[[node]]` tables.
#[derive(Debug, Default)]
pub struct StaticInventory {
	by_hostname: HashMap<String, Node>,
}

impl StaticInventory {
	pub fn new(nodes: Vec<Node>) -> Result<Self, InventoryError> {
		let mut ids = HashSet::new();
		let mut by_hostname = HashMap::new();
		for node in nodes {
			if !NODE_ID.is_match(&node.id) {
				return Err(InventoryError::Invalid(format!("invalid node id {:?}", node.id)));
			}
			if node.role.trim().is_empty() {
				return Err(InventoryError::Invalid(format!("node {} has no role", node.id)));
			}
			if !ids.insert(node.id.clone()) {
				return Err(InventoryError::Invalid(format!("duplicate node id {}", node.id)));
			}
			let key = node.hostname.to_ascii_lowercase();
			if by_hostname.contains_key(&key) {
				return Err(InventoryError::Invalid(format!(
					"duplicate hostname {}",
					node.hostname
				)));
			}
			by_hostname.insert(key, node);
		}
		Ok(Self { by_hostname })
	}

	pub fn parse(path: &Path, content: &str) -> Result<Self, InventoryError> {
		let file: InventoryFile = toml::from_str(content).map_err(|source| InventoryError::Parse {
			path: path.to_path_buf(),
			source,
		})?;
		Self::new(file.nodes)
	}

	pub fn load(path: &Path) -> Result<Self, InventoryError> {
		let content = std::fs::read_to_string(path).map_err(|source| InventoryError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let inventory = Self::parse(path, &content)?;
		info!(path = %path.display(), nodes = inventory.len(), "loaded inventory");
		Ok(inventory)
	}

	pub fn len(&self) -> usize {
		self.by_hostname.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_hostname.is_empty()
	}
}

#[async_trait]
impl InventoryStore for StaticInventory {
	async fn resolve(&self, hostname: &str) -> Result<Node, InventoryError> {
		self.by_hostname
			.get(&hostname.to_ascii_lowercase())
			.cloned()
			.ok_or_else(|| InventoryError::NotFound(hostname.to_string()))
	}
}
