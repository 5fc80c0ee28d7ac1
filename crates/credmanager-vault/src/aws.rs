// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Login with the EC2 instance-identity document (`auth/aws`, ec2 method).

use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::client::VaultApi;
use crate::error::{Result, VaultError};
use crate::types::SecretAuth;

/// Instance metadata service reachable from every EC2 instance.
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/";

const PKCS7_PATH: &str = "latest/dynamic/instance-identity/pkcs7";
const AWS_LOGIN: &str = "auth/aws/login";

/// Reads the signed identity document from the instance metadata service.
pub struct Ec2Metadata {
	http: Client,
	base: Url,
}

impl Ec2Metadata {
	pub fn new(http: Client, base: &str) -> Result<Self> {
		let mut base = Url::parse(base)?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}
		Ok(Self { http, base })
	}

	/// The PKCS7 signature of the identity document, newlines removed as
	/// Vault expects.
	pub async fn pkcs7(&self) -> Result<String> {
		let url = self.base.join(PKCS7_PATH)?;
		let response = self.http.get(url).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(VaultError::InstanceIdentity(format!(
				"metadata service returned {status}"
			)));
		}
		let body = response.text().await?;
		let pkcs7: String = body.chars().filter(|c| *c != '\n' && *c != '\r').collect();
		if pkcs7.is_empty() {
			return Err(VaultError::InstanceIdentity(
				"empty identity signature".to_string(),
			));
		}
		Ok(pkcs7)
	}
}

/// AWS auth method helper.
pub struct AwsAuth<'a> {
	api: &'a dyn VaultApi,
}

impl<'a> AwsAuth<'a> {
	pub fn new(api: &'a dyn VaultApi) -> Self {
		Self { api }
	}

	/// Exchanges an identity signature for a token bound to `role`. `nonce`
	/// must match the one used on earlier logins from the same instance.
	#[instrument(skip(self, pkcs7, nonce))]
	pub async fn login_ec2(&self, pkcs7: &str, role: &str, nonce: Option<&str>) -> Result<SecretAuth> {
		let mut body = Map::new();
		body.insert("pkcs7".to_string(), json!(pkcs7));
		body.insert("role".to_string(), json!(role));
		if let Some(nonce) = nonce {
			body.insert("nonce".to_string(), json!(nonce));
		}

		let auth = self
			.api
			.write(AWS_LOGIN, Value::Object(body))
			.await?
			.ok_or_else(|| VaultError::EmptyResponse(AWS_LOGIN.to_string()))?
			.into_auth(AWS_LOGIN)?;
		debug!(policies = ?auth.policies, "logged in with EC2 instance identity");
		Ok(auth)
	}
}
