// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Issues response-wrapped Vault tokens scoped to a node.

use credmanager_common_core::PolicySet;
use credmanager_common_secret::SecretString;
use credmanager_vault::{Sys, TokenAuth, TokenCreateRequest, VaultApi, VaultError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::inventory::Node;
use crate::policy_template::{PolicyTemplate, TemplateError};

#[derive(Debug, Error)]
pub enum IssuerError {
	#[error("policies {denied:?} are not allowed for role {role}")]
	PolicyMismatch { role: String, denied: Vec<String> },

	#[error("policy template: {0}")]
	Template(#[from] TemplateError),

	#[error("vault: {0}")]
	Vault(#[from] VaultError),
}

#[derive(Debug, Clone)]
pub struct IssuerConfig {
	/// Token role the wrapped token is created against.
	pub token_role: String,
	pub wrap_ttl: Duration,
	pub policy_prefix: String,
	pub role_prefix: String,
}

pub struct TokenIssuer {
	vault: Arc<dyn VaultApi>,
	template: PolicyTemplate,
	config: IssuerConfig,
}

impl TokenIssuer {
	pub fn new(vault: Arc<dyn VaultApi>, template: PolicyTemplate, config: IssuerConfig) -> Self {
		Self {
			vault,
			template,
			config,
		}
	}

	pub fn policy_name(&self, node: &Node) -> String {
		format!("{}{}", self.config.policy_prefix, node.id)
	}

	pub fn role_name(&self, node: &Node) -> String {
		format!("{}{}", self.config.role_prefix, node.role)
	}

	/// The policies the node's role permits. `None` if the role is missing.
	async fn allowed_policies(&self, role: &str) -> Result<Option<PolicySet>, VaultError> {
		let Some(data) = TokenAuth::new(self.vault.as_ref()).read_role(role).await? else {
			return Ok(None);
		};
		let allowed = match data.get("allowed_policies") {
			Some(Value::Array(items)) => items
				.iter()
				.filter_map(Value::as_str)
				.map(str::to_string)
				.collect(),
			Some(Value::String(list)) => list
				.split(',')
				.map(str::trim)
				.filter(|p| !p.is_empty())
				.map(str::to_string)
				.collect(),
			_ => PolicySet::new(),
		};
		Ok(Some(allowed))
	}

	/// Writes the node's policy, checks `requested` against the node role's
	/// allowed policies and returns a wrapping token for a token holding
	/// the node policy plus `requested`.
	#[instrument(skip(self, node, requested), fields(node = %node.id, requested = %requested))]
	pub async fn issue(&self, node: &Node, requested: &PolicySet) -> Result<SecretString, IssuerError> {
		let policy_name = self.policy_name(node);
		let rules = self.template.render(node)?;
		Sys::new(self.vault.as_ref())
			.put_policy(&policy_name, &rules)
			.await?;
		debug!(policy = %policy_name, "wrote node policy");

		if !requested.is_empty() {
			let role = self.role_name(node);
			let allowed = self.allowed_policies(&role).await?.unwrap_or_default();
			if !requested.is_subset_of(&allowed) {
				return Err(IssuerError::PolicyMismatch {
					denied: requested.difference(&allowed),
					role,
				});
			}
		}

		let mut policies = PolicySet::new();
		policies.add(policy_name);
		policies.extend(requested.iter());

		let request =
			TokenCreateRequest::with_policies(policies.iter()).display_name(node.hostname.as_str());
		let wrap = TokenAuth::new(self.vault.as_ref())
			.create_wrapped_with_role(&request, &self.config.token_role, self.config.wrap_ttl)
			.await?;
		info!(policies = %policies, "issued wrapped token");
		Ok(wrap.token)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use credmanager_vault::{MemoryVault, Wrapping};
	use std::collections::BTreeMap;

	fn node() -> Node {
		Node {
			id: "n-0001".to_string(),
			hostname: "node-01".to_string(),
			ips: vec![],
			role: "bar-worker".to_string(),
			system: "linux".to_string(),
			attributes: BTreeMap::new(),
		}
	}

	fn issuer(vault: Arc<MemoryVault>) -> TokenIssuer {
		TokenIssuer::new(
			vault,
			PolicyTemplate::default(),
			IssuerConfig {
				token_role: "credmanager".to_string(),
				wrap_ttl: Duration::from_secs(300),
				policy_prefix: "credmanager-".to_string(),
				role_prefix: "credmanager-".to_string(),
			},
		)
	}

	#[tokio::test]
	async fn issues_token_with_node_and_requested_policies() {
		let vault = Arc::new(MemoryVault::new("root"));
		vault.set_role("credmanager", &["credmanager-n-0001", "bar-worker-ssh-cert"]);
		vault.set_role("credmanager-bar-worker", &["bar-worker-ssh-cert"]);
		let issuer = issuer(vault.clone());

		let requested: PolicySet = ["bar-worker-ssh-cert"].into_iter().collect();
		let wrapping = issuer.issue(&node(), &requested).await.unwrap();
		assert!(vault.contains("sys/policies/acl/credmanager-n-0001"));

		let secret = Wrapping::new(vault.as_ref()).unwrap(&wrapping).await.unwrap();
		let token = secret.into_auth("unwrap").unwrap().client_token;
		let mut policies = vault.token_policies(token.expose()).unwrap();
		policies.sort();
		assert_eq!(policies, vec!["bar-worker-ssh-cert", "credmanager-n-0001"]);
		assert_eq!(
			vault.token_display_name(token.expose()).as_deref(),
			Some("token-node-01")
		);
	}

	#[tokio::test]
	async fn accepts_comma_separated_allowed_policies() {
		let vault = Arc::new(MemoryVault::new("root"));
		vault.set_role("credmanager", &["credmanager-n-0001", "a", "b"]);
		vault.put(
			"auth/token/roles/credmanager-bar-worker",
			serde_json::json!({ "allowed_policies": "a, b" }),
		);
		let requested: PolicySet = ["a", "b"].into_iter().collect();
		assert!(issuer(vault).issue(&node(), &requested).await.is_ok());
	}

	#[tokio::test]
	async fn rejects_policies_outside_role() {
		let vault = Arc::new(MemoryVault::new("root"));
		vault.set_role("credmanager", &["credmanager-n-0001", "disallowed-policy"]);
		vault.set_role("credmanager-bar-worker", &["bar-worker-ssh-cert"]);

		let requested: PolicySet = ["disallowed-policy"].into_iter().collect();
		let err = issuer(vault.clone()).issue(&node(), &requested).await.unwrap_err();
		match err {
			IssuerError::PolicyMismatch { role, denied } => {
				assert_eq!(role, "credmanager-bar-worker");
				assert_eq!(denied, vec!["disallowed-policy"]);
			}
			other => panic!("unexpected error {other}"),
		}
		assert_eq!(vault.outstanding_wraps(), 0);
	}

	#[tokio::test]
	async fn missing_role_denies_requested_policies() {
		let vault = Arc::new(MemoryVault::new("root"));
		vault.set_role("credmanager", &["credmanager-n-0001", "x"]);
		let requested: PolicySet = ["x"].into_iter().collect();
		assert!(matches!(
			issuer(vault).issue(&node(), &requested).await,
			Err(IssuerError::PolicyMismatch { .. })
		));
	}
}
