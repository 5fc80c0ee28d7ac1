// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Node-side credential daemon.
//!
//! Obtains a Vault token for the node, keeps that token alive and keeps
//! every declared credential renewed until told to stop.

pub mod bootstrap;
pub mod config;
pub mod supervisor;
pub mod version;

pub use bootstrap::{Admission, BootstrapError, Ec2Login, TokenChain, TokenOrigin, VAULT_TOKEN_ENV};
pub use config::{ConfigError, DaemonConfig, Ec2LoginSection, LogFormat, DEFAULT_CONFIG_PATH};
pub use supervisor::{Supervisor, SupervisorError};
