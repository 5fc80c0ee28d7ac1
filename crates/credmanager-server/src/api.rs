// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Router and shared handler state.

use axum::{
	routing::{get, post},
	Router,
};
use credmanager_common_core::{HEALTH_PATH, TOKEN_PATH};
use credmanager_server_activation::NodeActivationStore;
use credmanager_vault::VaultApi;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::catalog::ServiceCatalog;
use crate::inventory::InventoryStore;
use crate::issuer::TokenIssuer;
use crate::routes;

/// Which optional admission gates are enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmissionGates {
	pub verify_source_ip: bool,
	pub reject_registered_nodes: bool,
}

#[derive(Clone)]
pub struct AppState {
	pub vault: Arc<dyn VaultApi>,
	pub inventory: Arc<dyn InventoryStore>,
	/// Required when `gates.reject_registered_nodes` is set.
	pub catalog: Option<Arc<dyn ServiceCatalog>>,
	pub activation: Arc<NodeActivationStore>,
	pub issuer: Arc<TokenIssuer>,
	pub gates: AdmissionGates,
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route(
			TOKEN_PATH,
			post(routes::token::issue_token).fallback(routes::method_not_allowed),
		)
		.route(
			HEALTH_PATH,
			get(routes::health::health_check).fallback(routes::method_not_allowed),
		)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
