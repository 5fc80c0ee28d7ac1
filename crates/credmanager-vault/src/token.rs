// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `auth/token/*` endpoints.

use credmanager_common_secret::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use crate::client::VaultApi;
use crate::error::{Result, VaultError};
use crate::types::{Data, SecretAuth, WrapInfo};

const RENEW_SELF: &str = "auth/token/renew-self";
const LOOKUP_SELF: &str = "auth/token/lookup-self";

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenCreateRequest {
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub policies: Vec<String>,
	/// Vault duration string, e.g. `"3600s"`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl: Option<String>,
	/// Shown in Vault's audit log, prefixed with `token-`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
}

impl TokenCreateRequest {
	pub fn with_policies<I, S>(policies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			policies: policies.into_iter().map(Into::into).collect(),
			..Default::default()
		}
	}

	/// Sets the TTL, leaving it unset for a zero duration.
	pub fn ttl(mut self, ttl: Duration) -> Self {
		self.ttl = (ttl.as_secs() > 0).then(|| format!("{}s", ttl.as_secs()));
		self
	}

	pub fn display_name(mut self, name: impl Into<String>) -> Self {
		self.display_name = Some(name.into());
		self
	}

	fn body(&self) -> Value {
		serde_json::to_value(self).unwrap_or_else(|_| json!({}))
	}
}

/// Token auth method helper.
pub struct TokenAuth<'a> {
	api: &'a dyn VaultApi,
}

impl<'a> TokenAuth<'a> {
	pub fn new(api: &'a dyn VaultApi) -> Self {
		Self { api }
	}

	fn auth_of(secret: Option<crate::VaultSecret>, path: &str) -> Result<SecretAuth> {
		secret
			.ok_or_else(|| VaultError::EmptyResponse(path.to_string()))?
			.into_auth(path)
	}

	#[instrument(skip(self, request), fields(policies = ?request.policies))]
	pub async fn create_with_role(
		&self,
		request: &TokenCreateRequest,
		role: &str,
	) -> Result<SecretAuth> {
		let path = format!("auth/token/create/{role}");
		Self::auth_of(self.api.write(&path, request.body()).await?, &path)
	}

	/// Role-scoped creation whose response is wrapped for `wrap_ttl`.
	#[instrument(skip(self, request), fields(policies = ?request.policies))]
	pub async fn create_wrapped_with_role(
		&self,
		request: &TokenCreateRequest,
		role: &str,
		wrap_ttl: Duration,
	) -> Result<WrapInfo> {
		let path = format!("auth/token/create/{role}");
		self.api.write_wrapped(&path, request.body(), wrap_ttl).await
	}

	/// Renews `token` using its own authority.
	#[instrument(skip(self, token))]
	pub async fn renew_as_self(
		&self,
		token: &SecretString,
		increment: Duration,
	) -> Result<SecretAuth> {
		let body = json!({ "increment": increment.as_secs() });
		Self::auth_of(self.api.write_as(token, RENEW_SELF, body).await?, RENEW_SELF)
	}

	/// Renews the client's own token.
	#[instrument(skip(self))]
	pub async fn renew_self(&self, increment: Duration) -> Result<SecretAuth> {
		let body = json!({ "increment": increment.as_secs() });
		Self::auth_of(self.api.write(RENEW_SELF, body).await?, RENEW_SELF)
	}

	/// Metadata for the client's own token.
	#[instrument(skip(self))]
	pub async fn lookup_self(&self) -> Result<Data> {
		let secret = self
			.api
			.read(LOOKUP_SELF)
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(LOOKUP_SELF.to_string()))?;
		Ok(secret.data(LOOKUP_SELF)?.clone())
	}

	/// Configuration of a token role, `None` if the role does not exist.
	pub async fn read_role(&self, role: &str) -> Result<Option<Data>> {
		let path = format!("auth/token/roles/{role}");
		Ok(self.api.read(&path).await?.and_then(|s| s.data))
	}
}
