// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use credmanager_renewal::{BoxError, RenewableCredential};
use credmanager_vault::{TokenAuth, VaultApi};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The process's own Vault token.
///
/// A zero lease means the token does not expire. Vault refuses to renew
/// such a token, so renewal degrades to a `lookup-self` validity check and
/// the renewer falls back to its default window.
pub struct VaultSelfToken {
	vault: Arc<dyn VaultApi>,
	lease: Duration,
}

impl VaultSelfToken {
	pub fn new(vault: Arc<dyn VaultApi>, lease: Duration) -> Self {
		Self { vault, lease }
	}

	/// Reads the current lease with `lookup-self`.
	pub async fn discover(vault: Arc<dyn VaultApi>) -> credmanager_vault::Result<Self> {
		let data = TokenAuth::new(vault.as_ref()).lookup_self().await?;
		let ttl = data.get("ttl").and_then(|v| v.as_u64()).unwrap_or(0);
		Ok(Self::new(vault, Duration::from_secs(ttl)))
	}

	pub fn lease(&self) -> Duration {
		self.lease
	}

	pub fn expires(&self) -> bool {
		!self.lease.is_zero()
	}
}

#[async_trait]
impl RenewableCredential for VaultSelfToken {
	async fn renew(&mut self) -> Result<(), BoxError> {
		if !self.expires() {
			TokenAuth::new(self.vault.as_ref()).lookup_self().await?;
			debug!("own Vault token does not expire, lookup succeeded");
			return Ok(());
		}

		let auth = TokenAuth::new(self.vault.as_ref())
			.renew_self(self.lease)
			.await?;
		self.lease = auth.lease();
		debug!(lease = ?self.lease, "renewed own Vault token");
		Ok(())
	}

	fn max_renew_interval(&self) -> Duration {
		self.lease
	}
}

impl fmt::Display for VaultSelfToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("credmanager Vault token")
	}
}
