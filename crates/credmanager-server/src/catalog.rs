// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Service catalog membership, used to refuse nodes that are already live.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
	#[error("catalog request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("invalid catalog address: {0}")]
	Url(#[from] url::ParseError),

	#[error("catalog returned {0}")]
	Status(u16),
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
	async fn is_registered(&self, hostname: &str) -> Result<bool, CatalogError>;
}

/// Consul's `/v1/catalog/node/<name>`, which answers `null` for unknown
/// nodes.
pub struct ConsulCatalog {
	http: reqwest::Client,
	address: Url,
}

impl ConsulCatalog {
	pub fn new(http: reqwest::Client, address: &str) -> Result<Self, CatalogError> {
		let mut address = Url::parse(address)?;
		if !address.path().ends_with('/') {
			let path = format!("{}/", address.path());
			address.set_path(&path);
		}
		Ok(Self { http, address })
	}
}

#[async_trait]
impl ServiceCatalog for ConsulCatalog {
	#[instrument(skip(self))]
	async fn is_registered(&self, hostname: &str) -> Result<bool, CatalogError> {
		let url = self.address.join(&format!("v1/catalog/node/{hostname}"))?;
		let response = self.http.get(url).send().await?;
		let status = response.status();
		if status == reqwest::StatusCode::NOT_FOUND {
			return Ok(false);
		}
		if !status.is_success() {
			return Err(CatalogError::Status(status.as_u16()));
		}
		let body: Value = response.json().await?;
		Ok(!body.is_null())
	}
}
