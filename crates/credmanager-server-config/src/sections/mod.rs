// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod activation;
mod admission;
mod http;
mod logging;
mod vault;

pub use activation::{
	ActivationConfig, ActivationConfigLayer, InventoryConfig, InventoryConfigLayer,
};
pub use admission::{AdmissionConfig, AdmissionConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{
	LogFormat, LoggingConfig, LoggingConfigLayer, ShutdownConfig, ShutdownConfigLayer,
};
pub use vault::{VaultConfig, VaultConfigLayer};
