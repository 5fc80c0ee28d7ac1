// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Admission server.
//!
//! Hands a response-wrapped Vault token to a node that is in the inventory,
//! calls from one of its known addresses, is not yet live in the service
//! catalog and has an open activation window.

pub mod api;
pub mod catalog;
pub mod error;
pub mod inventory;
pub mod issuer;
pub mod policy_template;
pub mod routes;
pub mod version;

pub use api::{create_router, AdmissionGates, AppState};
pub use catalog::{CatalogError, ConsulCatalog, ServiceCatalog};
pub use error::ServerError;
pub use inventory::{InventoryError, InventoryStore, Node, StaticInventory};
pub use issuer::{IssuerConfig, IssuerError, TokenIssuer};
pub use policy_template::{PolicyTemplate, TemplateError, DEFAULT_POLICY_TEMPLATE};
