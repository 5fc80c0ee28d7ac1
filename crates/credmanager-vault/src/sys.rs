// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use credmanager_common_secret::SecretString;
use serde_json::json;
use tracing::instrument;

use crate::client::VaultApi;
use crate::error::{Result, VaultError};
use crate::types::VaultSecret;

const UNWRAP: &str = "sys/wrapping/unwrap";

/// ACL policy management under `sys/policies/acl`.
pub struct Sys<'a> {
	api: &'a dyn VaultApi,
}

impl<'a> Sys<'a> {
	pub fn new(api: &'a dyn VaultApi) -> Self {
		Self { api }
	}

	/// Creates or replaces the named policy.
	#[instrument(skip(self, rules))]
	pub async fn put_policy(&self, name: &str, rules: &str) -> Result<()> {
		self.api
			.write(&format!("sys/policies/acl/{name}"), json!({ "policy": rules }))
			.await?;
		Ok(())
	}

	pub async fn get_policy(&self, name: &str) -> Result<Option<String>> {
		let path = format!("sys/policies/acl/{name}");
		Ok(self.api.read(&path).await?.and_then(|secret| {
			secret
				.data
				.and_then(|d| d.get("policy").and_then(|p| p.as_str()).map(str::to_string))
		}))
	}
}

/// Response unwrapping.
pub struct Wrapping<'a> {
	api: &'a dyn VaultApi,
}

impl<'a> Wrapping<'a> {
	pub fn new(api: &'a dyn VaultApi) -> Self {
		Self { api }
	}

	/// Exchanges a wrapping token for the wrapped response. A wrapping token
	/// can only be unwrapped once.
	#[instrument(skip(self, wrapping_token))]
	pub async fn unwrap(&self, wrapping_token: &SecretString) -> Result<VaultSecret> {
		self.api
			.write_as(wrapping_token, UNWRAP, json!({}))
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(UNWRAP.to_string()))
	}
}
