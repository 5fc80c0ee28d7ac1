// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Runs every managed credential's renewer and watches their reports.

use credmanager_credentials::{
	CredentialConfigs, KvTemplateRunner, PkiCertificate, SshHostCertificate, TemplateRenewer,
	VaultToken,
};
use credmanager_renewal::{
	CredentialRenewer, PostRenewAction, ReloadOrRestartUnit, RenewError, RenewableCredential,
	Renewer, RenewerMerger,
};
use credmanager_vault::{Kv, KvVersion, VaultApi};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error("unsupported kv_version {0} for template {1}")]
	KvVersion(u8, String),

	#[error("fatal renewal failure: {0}")]
	Fatal(RenewError),
}

enum Managed {
	Credential(CredentialRenewer),
	Template(TemplateRenewer),
}

impl Managed {
	fn name(&self) -> &str {
		match self {
			Managed::Credential(r) => r.name(),
			Managed::Template(r) => r.name(),
		}
	}

	fn renewer(&mut self) -> &mut dyn Renewer {
		match self {
			Managed::Credential(r) => r,
			Managed::Template(r) => r,
		}
	}

	fn start(&mut self) {
		match self {
			Managed::Credential(r) => r.renew(),
			Managed::Template(r) => r.renew(),
		}
	}

	async fn join(&mut self) {
		match self {
			Managed::Credential(r) => r.join().await,
			Managed::Template(r) => r.join().await,
		}
	}
}

fn notify_action(unit: Option<&str>) -> Option<Arc<dyn PostRenewAction>> {
	unit.map(|unit| Arc::new(ReloadOrRestartUnit::new(unit)) as Arc<dyn PostRenewAction>)
}

/// Owns the renewers. Add everything, then [`Supervisor::start`], then
/// [`Supervisor::run`] until shutdown, then [`Supervisor::shutdown`].
#[derive(Default)]
pub struct Supervisor {
	managed: Vec<Managed>,
	merger: RenewerMerger,
}

impl Supervisor {
	pub fn new() -> Self {
		Self::default()
	}

	/// Renewers for every declared credential, all sharing `vault`.
	pub async fn from_configs(
		configs: CredentialConfigs,
		vault: Arc<dyn VaultApi>,
	) -> Result<Self, SupervisorError> {
		let mut supervisor = Self::new();

		for config in configs.pki {
			let action = notify_action(config.notify.as_deref());
			supervisor.add_credential(PkiCertificate::new(config, vault.clone()), action);
		}
		for config in configs.ssh {
			let action = notify_action(config.notify.as_deref());
			supervisor.add_credential(SshHostCertificate::new(config, vault.clone()), action);
		}
		for config in configs.vault {
			let action = notify_action(config.notify.as_deref());
			let mut token = VaultToken::new(config, vault.clone());
			token.initialize().await;
			supervisor.add_credential(token, action);
		}
		for config in configs.template {
			let version = KvVersion::from_number(config.kv_version).ok_or_else(|| {
				SupervisorError::KvVersion(config.kv_version, config.source.display().to_string())
			})?;
			let action = notify_action(config.notify.as_deref());
			let kv = Kv::new(vault.clone(), config.kv_mount.clone(), version);
			let runner = KvTemplateRunner::new(
				config.source.clone(),
				config.destination.clone(),
				kv,
				config.poll_interval,
			);
			supervisor.add_template(TemplateRenewer::new(Box::new(runner), action));
		}

		Ok(supervisor)
	}

	pub fn add_credential<C>(&mut self, credential: C, action: Option<Arc<dyn PostRenewAction>>)
	where
		C: RenewableCredential + 'static,
	{
		self.managed
			.push(Managed::Credential(CredentialRenewer::new(credential, action)));
	}

	pub fn add_renewer(&mut self, renewer: CredentialRenewer) {
		self.managed.push(Managed::Credential(renewer));
	}

	pub fn add_template(&mut self, renewer: TemplateRenewer) {
		self.managed.push(Managed::Template(renewer));
	}

	pub fn len(&self) -> usize {
		self.managed.len()
	}

	pub fn is_empty(&self) -> bool {
		self.managed.is_empty()
	}

	/// Merges every renewer's channels and starts them.
	pub fn start(&mut self) {
		for managed in &mut self.managed {
			self.merger.add_renewer(managed.renewer());
		}
		for managed in &mut self.managed {
			managed.start();
			info!(credential = managed.name(), "managing credential");
		}
	}

	/// Logs renewal reports until `shutdown` completes. Returns an error on
	/// the first terminal renewal failure.
	pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SupervisorError>
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);
		let (renewals, errors) = self.merger.channels();
		loop {
			tokio::select! {
				_ = &mut shutdown => return Ok(()),
				Some(output) = renewals.recv() => {
					info!(credential = %output.source, "{output}");
				}
				Some(err) = errors.recv() => {
					if err.is_terminal() {
						error!(credential = err.credential(), error = %err, "credential can no longer be renewed");
						return Err(SupervisorError::Fatal(err));
					}
					warn!(credential = err.credential(), error = %err, "renewal error");
				}
			}
		}
	}

	/// Stops every renewer and waits up to `grace` for them to exit.
	/// Returns false if the grace period ran out.
	pub async fn shutdown(&mut self, grace: Duration) -> bool {
		for managed in &mut self.managed {
			managed.renewer().stop();
		}
		let join_all = async {
			for managed in &mut self.managed {
				managed.join().await;
			}
		};
		match tokio::time::timeout(grace, join_all).await {
			Ok(()) => {
				info!("all renewers stopped");
				true
			}
			Err(_) => {
				warn!(?grace, "renewers did not stop within the grace period");
				false
			}
		}
	}
}
