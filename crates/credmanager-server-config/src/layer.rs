// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{
	ActivationConfigLayer, AdmissionConfigLayer, HttpConfigLayer, InventoryConfigLayer,
	LoggingConfigLayer, ShutdownConfigLayer, VaultConfigLayer,
};

/// One source's partial view of the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigLayer {
	pub http: Option<HttpConfigLayer>,
	pub vault: Option<VaultConfigLayer>,
	pub activation: Option<ActivationConfigLayer>,
	pub inventory: Option<InventoryConfigLayer>,
	pub admission: Option<AdmissionConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
	pub shutdown: Option<ShutdownConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(other)) => merge(existing, other),
		(None, Some(other)) => *base = Some(other),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlays `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.vault, other.vault, VaultConfigLayer::merge);
		merge_section(&mut self.activation, other.activation, ActivationConfigLayer::merge);
		merge_section(&mut self.inventory, other.inventory, InventoryConfigLayer::merge);
		merge_section(&mut self.admission, other.admission, AdmissionConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.shutdown, other.shutdown, ShutdownConfigLayer::merge);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn later_layers_override_field_by_field() {
		let mut base: ServerConfigLayer = toml::from_str(
			r#"
[http]
host = "127.0.0.1"
port = 9000

[vault]
kv_mount = "kv"
"#,
		)
		.unwrap();
		let env = ServerConfigLayer {
			http: Some(HttpConfigLayer {
				port: Some(9443),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(env);

		let http = base.http.unwrap();
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
		assert_eq!(http.port, Some(9443));
		assert_eq!(base.vault.unwrap().kv_mount.as_deref(), Some("kv"));
	}

	#[test]
	fn unknown_sections_are_rejected() {
		assert!(toml::from_str::<ServerConfigLayer>("[database]\nurl = \"x\"").is_err());
	}
}
