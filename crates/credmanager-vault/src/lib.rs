// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Minimal HashiCorp Vault client.
//!
//! [`VaultApi`] is the seam every other credmanager crate talks to. The HTTP
//! implementation is [`VaultClient`]; tests can enable the `testing` feature
//! and use [`MemoryVault`] instead. Typed helpers sit on top of the trait:
//!
//! - [`Kv`] for KV v1/v2 mounts
//! - [`TokenAuth`] for `auth/token/*`
//! - [`Sys`] for ACL policies
//! - [`Wrapping`] for response-wrapped secrets
//! - [`AwsAuth`] and [`Ec2Metadata`] for EC2 instance-identity login

mod aws;
mod client;
mod error;
mod kv;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod sys;
mod token;
mod types;

pub use aws::{AwsAuth, Ec2Metadata, DEFAULT_METADATA_URL};
pub use client::{VaultApi, VaultClient};
pub use error::{Result, VaultError};
pub use kv::{Kv, KvVersion};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryVault;
pub use sys::{Sys, Wrapping};
pub use token::{TokenAuth, TokenCreateRequest};
pub use types::{Data, HealthStatus, SecretAuth, VaultSecret, WrapInfo};
