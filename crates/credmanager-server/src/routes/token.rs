// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! `POST /token`: admission of an activated node.
//!
//! Gates run in order and the first failure ends the request: body, node
//! lookup, source address, catalog membership, activation window, policy
//! authorization. A successful issuance closes the activation window; if
//! that fails the token is still returned.

use axum::{
	extract::{ConnectInfo, Request, State},
	http::StatusCode,
	response::IntoResponse,
	Json,
};
use credmanager_common_core::{PolicySet, TokenRequest, TokenResponse};
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::api::AppState;
use crate::error::ServerError;
use crate::inventory::InventoryError;
use crate::issuer::IssuerError;

/// Upper bound on an admission request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub async fn issue_token(
	State(state): State<AppState>,
	request: Request,
) -> Result<impl IntoResponse, ServerError> {
	let peer = request
		.extensions()
		.get::<ConnectInfo<SocketAddr>>()
		.map(|ConnectInfo(addr)| *addr);

	let body = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
		.await
		.map_err(|err| {
			debug!(error = %err, "failed to read request body");
			ServerError::BadRequest
		})?;
	let token_request: TokenRequest = serde_json::from_slice(&body).map_err(|err| {
		debug!(error = %err, "malformed token request");
		ServerError::BadRequest
	})?;
	if token_request.hostname.trim().is_empty() {
		return Err(ServerError::BadRequest);
	}
	let hostname = token_request.hostname.as_str();

	let node = state.inventory.resolve(hostname).await.map_err(|err| {
		match err {
			InventoryError::NotFound(_) => warn!(hostname, "token request for unknown node"),
			other => error!(hostname, error = %other, "inventory lookup failed"),
		}
		ServerError::UnknownNode
	})?;

	if state.gates.verify_source_ip {
		let Some(peer) = peer else {
			error!(node = %node.id, "source address unavailable");
			return Err(ServerError::Internal);
		};
		if !node.has_ip(peer.ip()) {
			warn!(node = %node.id, source = %peer.ip(), "source address does not match inventory");
			return Err(ServerError::SourceMismatch);
		}
	}

	if state.gates.reject_registered_nodes {
		let Some(catalog) = state.catalog.as_ref() else {
			error!("catalog check enabled without a catalog");
			return Err(ServerError::Internal);
		};
		match catalog.is_registered(&node.hostname).await {
			Ok(false) => {}
			Ok(true) => {
				warn!(node = %node.id, "node is already registered in the catalog");
				return Err(ServerError::AlreadyRegistered);
			}
			Err(err) => {
				error!(node = %node.id, error = %err, "catalog lookup failed");
				return Err(ServerError::Internal);
			}
		}
	}

	if !state.activation.active(&node.id).await {
		let status = state
			.activation
			.status(&node.id)
			.await
			.unwrap_or_else(|err| format!("{}: {err}", node.id));
		warn!(node = %node.id, %status, "token request outside activation window");
		return Err(ServerError::NotActive);
	}

	let requested: PolicySet = token_request.policies.iter().map(String::as_str).collect();
	let token = state
		.issuer
		.issue(&node, &requested)
		.await
		.map_err(|err| match err {
			IssuerError::PolicyMismatch { .. } => {
				warn!(node = %node.id, error = %err, "policy request denied");
				ServerError::PolicyMismatch
			}
			other => {
				error!(node = %node.id, error = %other, "token issuance failed");
				ServerError::Internal
			}
		})?;

	if let Err(err) = state.activation.deactivate(&node.id).await {
		warn!(node = %node.id, error = %err, "failed to deactivate node after issuance");
	}

	info!(node = %node.id, hostname = %node.hostname, "issued token");
	Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}
