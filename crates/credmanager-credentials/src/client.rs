// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client for the admission server.
//!
//! A freshly provisioned node has no Vault token. It asks the admission
//! server for one, receives a response-wrapped token, and unwraps it
//! directly against Vault so the admission server never sees the final
//! secret. The unwrapped token is cached on disk for later starts.

use credmanager_common_core::{ErrorResponse, TokenRequest, TokenResponse, TOKEN_PATH};
use credmanager_common_http::{retry, RetryConfig, RetryableError};
use credmanager_common_secret::SecretString;
use credmanager_vault::{VaultApi, VaultError, Wrapping};
use regex::Regex;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::file::CredentialFile;

static UUID_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
		.unwrap()
});

static SERVICE_TOKEN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(hvs|s)\.[A-Za-z0-9_\-]+$").unwrap());

/// True for UUID-style tokens and `hvs.`/`s.` service tokens.
pub fn is_valid_token_format(token: &str) -> bool {
	UUID_TOKEN.is_match(token) || SERVICE_TOKEN.is_match(token)
}

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("request to admission server failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("admission denied: {0}")]
	Denied(String),

	#[error("admission server rejected the request: {0}")]
	BadRequest(String),

	#[error("admission server error: {0}")]
	Server(String),

	#[error("unexpected response from admission server: {0}")]
	Unexpected(StatusCode),

	#[error("invalid {0} token format")]
	InvalidTokenFormat(&'static str),

	#[error("failed to unwrap token: {0}")]
	Unwrap(#[from] VaultError),

	#[error("failed to access {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid admission server URL: {0}")]
	Url(#[from] url::ParseError),
}

impl RetryableError for ClientError {
	fn is_retryable(&self) -> bool {
		match self {
			ClientError::Http(err) => err.is_retryable(),
			ClientError::Server(_) => true,
			_ => false,
		}
	}
}

pub struct CredmanagerClient {
	http: reqwest::Client,
	token_url: Url,
	token_file: CredentialFile,
	retry: RetryConfig,
}

impl CredmanagerClient {
	pub fn new(
		http: reqwest::Client,
		server_url: &str,
		token_file: impl Into<PathBuf>,
	) -> Result<Self, ClientError> {
		let mut base = Url::parse(server_url)?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}
		Ok(Self {
			http,
			token_url: base.join(TOKEN_PATH.trim_start_matches('/'))?,
			token_file: CredentialFile::new(token_file, 0o600),
			retry: RetryConfig::default(),
		})
	}

	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// A Vault token for this node: the cached one if present and well
	/// formed, otherwise a new one from the admission server.
	#[instrument(skip(self, vault), fields(hostname = %request.hostname))]
	pub async fn get_token(
		&self,
		request: &TokenRequest,
		vault: &dyn VaultApi,
	) -> Result<SecretString, ClientError> {
		if let Some(token) = self.load_token()? {
			debug!(path = %self.token_file.path.display(), "using cached token");
			return Ok(token);
		}

		let wrapped = retry(&self.retry, || self.request_token(request)).await?;
		if !is_valid_token_format(wrapped.expose()) {
			return Err(ClientError::InvalidTokenFormat("wrapping"));
		}

		let secret = Wrapping::new(vault).unwrap(&wrapped).await?;
		let token = secret.into_auth("sys/wrapping/unwrap")?.client_token;
		if !is_valid_token_format(token.expose()) {
			return Err(ClientError::InvalidTokenFormat("unwrapped"));
		}

		self.save_token(&token)?;
		info!(path = %self.token_file.path.display(), "obtained Vault token from admission server");
		Ok(token)
	}

	fn load_token(&self) -> Result<Option<SecretString>, ClientError> {
		let content = self.token_file.read().map_err(|source| ClientError::Io {
			path: self.token_file.path.clone(),
			source,
		})?;
		Ok(content
			.map(|c| SecretString::from(c).trimmed())
			.filter(|t| is_valid_token_format(t.expose())))
	}

	fn save_token(&self, token: &SecretString) -> Result<(), ClientError> {
		self.token_file
			.write(token.expose())
			.map_err(|source| ClientError::Io {
				path: self.token_file.path.clone(),
				source,
			})
	}

	/// One POST to the admission server, returning the wrapping token.
	async fn request_token(&self, request: &TokenRequest) -> Result<SecretString, ClientError> {
		let response = self.http.post(self.token_url.clone()).json(request).send().await?;
		let status = response.status();

		match status {
			StatusCode::CREATED => {
				let body: TokenResponse = response.json().await?;
				Ok(body.token)
			}
			StatusCode::FORBIDDEN => Err(ClientError::Denied(error_message(response).await)),
			StatusCode::BAD_REQUEST => Err(ClientError::BadRequest(error_message(response).await)),
			StatusCode::INTERNAL_SERVER_ERROR => {
				Err(ClientError::Server(error_message(response).await))
			}
			other => Err(ClientError::Unexpected(other)),
		}
	}
}

async fn error_message(response: reqwest::Response) -> String {
	match response.json::<ErrorResponse>().await {
		Ok(body) => body.message,
		Err(_) => "no error message".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_formats() {
		assert!(is_valid_token_format("hvs.CAESIJ3kbnbbJ0aDr7zJx9"));
		assert!(is_valid_token_format("s.Tq2zOt7LgdQ7bY9lrCnX5x0R"));
		assert!(is_valid_token_format("3a4f1c2e-9b7d-4e6a-8f01-23456789abcd"));
		assert!(!is_valid_token_format(""));
		assert!(!is_valid_token_format("hvs."));
		assert!(!is_valid_token_format("token with spaces"));
		assert!(!is_valid_token_format("3a4f1c2e-9b7d-4e6a-8f01"));
	}

	#[test]
	fn token_url_is_joined_under_base() {
		let http = reqwest::Client::new();
		let client = CredmanagerClient::new(http.clone(), "https://admission.example.com", "/t").unwrap();
		assert_eq!(client.token_url().as_str(), "https://admission.example.com/token");

		let client =
			CredmanagerClient::new(http, "https://example.com/credmanager", "/t").unwrap();
		assert_eq!(client.token_url().as_str(), "https://example.com/credmanager/token");
	}

	#[test]
	fn only_transient_errors_retry() {
		assert!(ClientError::Server("boom".into()).is_retryable());
		assert!(!ClientError::Denied("inactive".into()).is_retryable());
		assert!(!ClientError::BadRequest("bad".into()).is_retryable());
		assert!(!ClientError::InvalidTokenFormat("wrapping").is_retryable());
	}
}
