// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Credentials kept alive by the credmanager daemon.
//!
//! Each timer-driven type implements
//! [`credmanager_renewal::RenewableCredential`]:
//!
//! - [`PkiCertificate`]: X.509 certificate, signed from a local CSR or
//!   fully issued by Vault
//! - [`SshHostCertificate`]: SSH host certificate for the existing host key
//! - [`VaultToken`]: scoped token written to disk for another process
//! - [`VaultSelfToken`]: the daemon's own token
//!
//! Templates are event driven and use [`TemplateRenewer`] instead.
//! [`CredmanagerClient`] fetches the daemon's first token from the
//! admission server.

mod client;
mod config;
mod error;
mod file;
mod pki;
mod self_token;
mod ssh;
mod template;
mod vault_token;

pub use client::{is_valid_token_format, ClientError, CredmanagerClient};
pub use config::{
	load_credential_configs, parse_credential_config, CredentialConfigs, PkiCertificateConfig,
	PkiMode, SshCertificateConfig, TemplateConfig, VaultTokenConfig,
};
pub use error::{CredentialError, Result};
pub use file::{CredentialFile, StagedFile, DEFAULT_MODE};
pub use pki::PkiCertificate;
pub use self_token::VaultSelfToken;
pub use ssh::SshHostCertificate;
pub use template::{KvTemplateRunner, RenderEvent, RunnerChannels, TemplateRenewer, TemplateRunner};
pub use vault_token::{VaultToken, FALLBACK_INTERVAL};
