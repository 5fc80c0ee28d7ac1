// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Admission gate configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfigLayer {
	pub verify_source_ip: Option<bool>,
	pub catalog_address: Option<String>,
	pub reject_registered_nodes: Option<bool>,
}

impl AdmissionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.verify_source_ip.is_some() {
			self.verify_source_ip = other.verify_source_ip;
		}
		if other.catalog_address.is_some() {
			self.catalog_address = other.catalog_address;
		}
		if other.reject_registered_nodes.is_some() {
			self.reject_registered_nodes = other.reject_registered_nodes;
		}
	}

	pub fn finalize(self) -> AdmissionConfig {
		AdmissionConfig {
			verify_source_ip: self.verify_source_ip.unwrap_or(true),
			catalog_address: self.catalog_address,
			reject_registered_nodes: self.reject_registered_nodes.unwrap_or(false),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdmissionConfig {
	/// Require the request to come from one of the node's inventory IPs.
	pub verify_source_ip: bool,
	/// Consul HTTP address used for the registered-node check.
	pub catalog_address: Option<String>,
	/// Refuse nodes that are already registered in the catalog.
	pub reject_registered_nodes: bool,
}

impl Default for AdmissionConfig {
	fn default() -> Self {
		AdmissionConfigLayer::default().finalize()
	}
}
