// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The [`VaultApi`] seam and its HTTP implementation.

use async_trait::async_trait;
use credmanager_common_secret::SecretString;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, VaultError};
use crate::types::{HealthStatus, VaultSecret, WrapInfo};

const HEALTH: &str = "sys/health";
const TOKEN_HEADER: &str = "X-Vault-Token";
const WRAP_TTL_HEADER: &str = "X-Vault-Wrap-TTL";

/// Logical operations against Vault. Paths are relative to `/v1/`.
///
/// Implementations are shared between every credential renewer in a
/// process and must be internally synchronized.
#[async_trait]
pub trait VaultApi: Send + Sync {
	/// `Ok(None)` when nothing exists at `path`.
	async fn read(&self, path: &str) -> Result<Option<VaultSecret>>;

	async fn write(&self, path: &str, data: Value) -> Result<Option<VaultSecret>>;

	/// Write with response wrapping; the real response is only reachable by
	/// unwrapping the returned token.
	async fn write_wrapped(&self, path: &str, data: Value, wrap_ttl: Duration) -> Result<WrapInfo>;

	/// Write authenticated with `token` instead of the client's own token.
	async fn write_as(
		&self,
		token: &SecretString,
		path: &str,
		data: Value,
	) -> Result<Option<VaultSecret>>;

	async fn delete(&self, path: &str) -> Result<()>;

	/// Keys under `path`; empty when the path does not exist.
	async fn list(&self, path: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	#[serde(default)]
	errors: Vec<String>,
}

/// HTTP client for a Vault server.
pub struct VaultClient {
	http: Client,
	address: Url,
	token: RwLock<SecretString>,
}

impl VaultClient {
	pub fn new(address: &str, token: SecretString) -> Result<Self> {
		Self::with_http_client(credmanager_common_http::new_client()?, address, token)
	}

	pub fn with_http_client(http: Client, address: &str, token: SecretString) -> Result<Self> {
		let mut address = Url::parse(address)?;
		if !address.path().ends_with('/') {
			let path = format!("{}/", address.path());
			address.set_path(&path);
		}
		Ok(Self {
			http,
			address,
			token: RwLock::new(token),
		})
	}

	pub fn address(&self) -> &Url {
		&self.address
	}

	/// Replace the token used for subsequent requests.
	pub fn set_token(&self, token: SecretString) {
		match self.token.write() {
			Ok(mut guard) => *guard = token,
			Err(poisoned) => *poisoned.into_inner() = token,
		}
	}

	pub fn token(&self) -> SecretString {
		match self.token.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}

	/// Checks `sys/health` without a token. Standby nodes count as ready; a
	/// sealed or uninitialized server does not.
	#[instrument(skip(self), fields(vault_addr = %self.address))]
	pub async fn health(&self) -> Result<HealthStatus> {
		let mut url = self.url(HEALTH)?;
		url.query_pairs_mut()
			.append_pair("standbyok", "true")
			.append_pair("perfstandbyok", "true");

		let response = self.http.get(url).send().await?;
		let status = response.status();
		let bytes = response.bytes().await?;
		let decoded = serde_json::from_slice::<HealthStatus>(&bytes);

		let health = match decoded {
			Ok(health) => health,
			Err(_) if !status.is_success() => {
				return Err(VaultError::Api {
					status: status.as_u16(),
					path: HEALTH.to_string(),
					errors: Vec::new(),
				})
			}
			Err(source) => {
				return Err(VaultError::Decode {
					path: HEALTH.to_string(),
					source,
				})
			}
		};

		if !status.is_success() || health.sealed || !health.initialized {
			return Err(VaultError::Unhealthy {
				status: status.as_u16(),
				initialized: health.initialized,
				sealed: health.sealed,
			});
		}
		debug!(version = %health.version, standby = health.standby, "Vault is ready");
		Ok(health)
	}

	fn url(&self, path: &str) -> Result<Url> {
		Ok(self
			.address
			.join(&format!("v1/{}", path.trim_start_matches('/')))?)
	}

	#[instrument(skip(self, token, body), fields(vault_addr = %self.address))]
	async fn send(
		&self,
		method: Method,
		path: &str,
		token: Option<&SecretString>,
		body: Option<&Value>,
		wrap_ttl: Option<Duration>,
	) -> Result<Option<VaultSecret>> {
		let mut url = self.url(path)?;
		let is_list = method == Method::GET && path.ends_with('/');
		if is_list {
			url.query_pairs_mut().append_pair("list", "true");
		}

		let token = token.cloned().unwrap_or_else(|| self.token());
		let mut request = self
			.http
			.request(method.clone(), url)
			.header(TOKEN_HEADER, token.expose().as_str());
		if let Some(ttl) = wrap_ttl {
			request = request.header(WRAP_TTL_HEADER, format!("{}s", ttl.as_secs()));
		}
		if let Some(body) = body {
			request = request.json(body);
		}

		debug!(%method, path, "sending Vault request");
		let response = request.send().await?;
		let status = response.status();

		if status == StatusCode::NO_CONTENT {
			return Ok(None);
		}
		if status == StatusCode::NOT_FOUND && method == Method::GET {
			return Ok(None);
		}

		let bytes = response.bytes().await?;
		if !status.is_success() {
			let errors = serde_json::from_slice::<ErrorBody>(&bytes)
				.map(|b| b.errors)
				.unwrap_or_default();
			return Err(VaultError::Api {
				status: status.as_u16(),
				path: path.to_string(),
				errors,
			});
		}
		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes)
			.map(Some)
			.map_err(|source| VaultError::Decode {
				path: path.to_string(),
				source,
			})
	}
}

impl std::fmt::Debug for VaultClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VaultClient")
			.field("address", &self.address.as_str())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl VaultApi for VaultClient {
	async fn read(&self, path: &str) -> Result<Option<VaultSecret>> {
		self.send(Method::GET, path, None, None, None).await
	}

	async fn write(&self, path: &str, data: Value) -> Result<Option<VaultSecret>> {
		self.send(Method::POST, path, None, Some(&data), None).await
	}

	async fn write_wrapped(&self, path: &str, data: Value, wrap_ttl: Duration) -> Result<WrapInfo> {
		self.send(Method::POST, path, None, Some(&data), Some(wrap_ttl))
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(path.to_string()))?
			.into_wrap_info(path)
	}

	async fn write_as(
		&self,
		token: &SecretString,
		path: &str,
		data: Value,
	) -> Result<Option<VaultSecret>> {
		self.send(Method::POST, path, Some(token), Some(&data), None).await
	}

	async fn delete(&self, path: &str) -> Result<()> {
		self.send(Method::DELETE, path, None, None, None).await?;
		Ok(())
	}

	async fn list(&self, path: &str) -> Result<Vec<String>> {
		let path = format!("{}/", path.trim_end_matches('/'));
		let Some(secret) = self.send(Method::GET, &path, None, None, None).await? else {
			return Ok(Vec::new());
		};
		Ok(secret
			.data
			.as_ref()
			.and_then(|d| d.get("keys"))
			.and_then(|k| k.as_array())
			.map(|keys| {
				keys.iter()
					.filter_map(|k| k.as_str().map(str::to_string))
					.collect()
			})
			.unwrap_or_default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn url_joins_under_v1() {
		let client = VaultClient::new("https://vault.example:8200", SecretString::from("t")).unwrap();
		assert_eq!(
			client.url("secret/data/x").unwrap().as_str(),
			"https://vault.example:8200/v1/secret/data/x"
		);
		assert_eq!(
			client.url("/auth/token/lookup-self").unwrap().as_str(),
			"https://vault.example:8200/v1/auth/token/lookup-self"
		);
	}

	#[test]
	fn address_with_prefix_keeps_prefix() {
		let client = VaultClient::new("https://proxy.example/vault", SecretString::from("t")).unwrap();
		assert_eq!(
			client.url("sys/health").unwrap().as_str(),
			"https://proxy.example/vault/v1/sys/health"
		);
	}

	#[test]
	fn debug_and_set_token() {
		let client = VaultClient::new("http://127.0.0.1:8200", SecretString::from("hvs.one")).unwrap();
		assert!(!format!("{client:?}").contains("hvs.one"));
		client.set_token(SecretString::from("hvs.two"));
		assert_eq!(client.token().expose(), "hvs.two");
	}

	#[test]
	fn rejects_bad_address() {
		assert!(VaultClient::new("not a url", SecretString::default()).is_err());
	}
}
