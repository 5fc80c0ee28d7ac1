// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use credmanager_common_secret::SecretString;
use credmanager_renewal::{BoxError, RenewableCredential};
use credmanager_vault::{TokenAuth, TokenCreateRequest, VaultApi};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::VaultTokenConfig;
use crate::error::{CredentialError, Result};

/// Interval used when no lifetime is configured and the first issuance
/// fails, so the renewer retries soon.
pub const FALLBACK_INTERVAL: Duration = Duration::from_secs(10);

/// A Vault token written to disk for another process.
///
/// The renewal interval starts at the configured lifetime and narrows to
/// the shortest lease Vault has reported. It never widens.
pub struct VaultToken {
	config: VaultTokenConfig,
	vault: Arc<dyn VaultApi>,
	interval: Duration,
}

impl VaultToken {
	pub fn new(config: VaultTokenConfig, vault: Arc<dyn VaultApi>) -> Self {
		let interval = config.lifetime;
		Self {
			config,
			vault,
			interval,
		}
	}

	/// Without a configured lifetime the interval is unknown until a token
	/// has been issued, so issue one up front.
	pub async fn initialize(&mut self) {
		if !self.interval.is_zero() {
			return;
		}
		if let Err(err) = self.issue().await {
			warn!(error = %err, credential = %self, "initial token issuance failed");
			self.interval = FALLBACK_INTERVAL;
		}
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	fn update_interval(&mut self, lease: Duration) {
		if !lease.is_zero() && (lease < self.interval || self.interval.is_zero()) {
			self.interval = lease;
		}
	}

	fn stored_token(&self) -> Result<Option<SecretString>> {
		let file = &self.config.token_file;
		let content = file
			.read()
			.map_err(|e| CredentialError::io(&file.path, e))?;
		Ok(content
			.map(SecretString::from)
			.map(|t| t.trimmed())
			.filter(|t| !t.is_blank()))
	}

	#[instrument(skip(self), fields(role = %self.config.role))]
	async fn issue(&mut self) -> Result<()> {
		let request =
			TokenCreateRequest::with_policies(self.config.policies.iter().cloned()).ttl(self.interval);
		let auth = TokenAuth::new(self.vault.as_ref())
			.create_with_role(&request, &self.config.role)
			.await?;
		self.update_interval(auth.lease());

		let file = &self.config.token_file;
		file.write(auth.client_token.expose())
			.map_err(|e| CredentialError::io(&file.path, e))?;
		info!(path = %file.path.display(), "issued new Vault token");
		Ok(())
	}

	async fn renew_stored(&mut self, token: &SecretString) -> Result<()> {
		let auth = TokenAuth::new(self.vault.as_ref())
			.renew_as_self(token, self.interval)
			.await?;
		self.update_interval(auth.lease());
		Ok(())
	}
}

#[async_trait]
impl RenewableCredential for VaultToken {
	async fn renew(&mut self) -> std::result::Result<(), BoxError> {
		if let Some(token) = self.stored_token()? {
			match self.renew_stored(&token).await {
				Ok(()) => return Ok(()),
				// Expired or revoked: mint a replacement.
				Err(CredentialError::Vault(err)) if err.is_forbidden() => {
					warn!(credential = %self, "stored token is no longer valid, issuing a new one");
				}
				Err(err) => return Err(err.into()),
			}
		}
		self.issue().await?;
		Ok(())
	}

	fn max_renew_interval(&self) -> Duration {
		self.interval
	}
}

impl fmt::Display for VaultToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Vault Token for policies '{}' stored at '{}'",
			self.config.policies.join(" "),
			self.config.token_file.path.display()
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::file::CredentialFile;
	use credmanager_vault::MemoryVault;

	fn setup(lifetime: Duration) -> (tempfile::TempDir, Arc<MemoryVault>, VaultToken) {
		let dir = tempfile::tempdir().unwrap();
		let vault = Arc::new(MemoryVault::new("root"));
		vault.set_role("app", &["app-read", "app-write"]);
		let config = VaultTokenConfig {
			policies: vec!["app-read".to_string()],
			role: "app".to_string(),
			token_file: CredentialFile::new(dir.path().join("token"), 0o600),
			lifetime,
			notify: None,
		};
		let token = VaultToken::new(config, vault.clone());
		(dir, vault, token)
	}

	#[tokio::test]
	async fn first_renewal_issues_and_writes_token() {
		let (dir, vault, mut token) = setup(Duration::from_secs(600));
		token.renew().await.unwrap();

		let written = std::fs::read_to_string(dir.path().join("token")).unwrap();
		assert!(written.starts_with("hvs."));
		assert_eq!(
			vault.token_policies(&written),
			Some(vec!["app-read".to_string()])
		);
		assert_eq!(token.max_renew_interval(), Duration::from_secs(600));
	}

	#[tokio::test]
	async fn existing_token_is_renewed_in_place() {
		let (dir, vault, mut token) = setup(Duration::from_secs(600));
		token.renew().await.unwrap();
		let first = std::fs::read_to_string(dir.path().join("token")).unwrap();

		token.renew().await.unwrap();
		let second = std::fs::read_to_string(dir.path().join("token")).unwrap();
		assert_eq!(first, second);
		assert_eq!(vault.token_ttl(&second), Some(Duration::from_secs(600)));
	}

	#[tokio::test]
	async fn revoked_token_is_replaced() {
		let (dir, vault, mut token) = setup(Duration::from_secs(600));
		token.renew().await.unwrap();
		let first = std::fs::read_to_string(dir.path().join("token")).unwrap();
		vault.revoke(&first);

		token.renew().await.unwrap();
		let second = std::fs::read_to_string(dir.path().join("token")).unwrap();
		assert_ne!(first, second);
	}

	#[tokio::test]
	async fn initialize_learns_interval_from_lease() {
		let (_dir, _vault, mut token) = setup(Duration::ZERO);
		token.initialize().await;
		// MemoryVault's default lease.
		assert_eq!(token.interval(), Duration::from_secs(3600));
	}

	#[tokio::test]
	async fn initialize_falls_back_when_issuance_fails() {
		let (_dir, vault, mut token) = setup(Duration::ZERO);
		vault.fail_path("auth/token/create");
		token.initialize().await;
		assert_eq!(token.interval(), FALLBACK_INTERVAL);
	}

	#[test]
	fn interval_only_narrows() {
		let (_dir, _vault, mut token) = setup(Duration::from_secs(600));
		token.update_interval(Duration::from_secs(900));
		assert_eq!(token.interval(), Duration::from_secs(600));
		token.update_interval(Duration::ZERO);
		assert_eq!(token.interval(), Duration::from_secs(600));
		token.update_interval(Duration::from_secs(300));
		assert_eq!(token.interval(), Duration::from_secs(300));
		assert_eq!(
			token.to_string(),
			format!(
				"Vault Token for policies 'app-read' stored at '{}'",
				token.config.token_file.path.display()
			)
		);
	}
}
