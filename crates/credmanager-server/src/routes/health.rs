// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use credmanager_common_core::HealthResponse;
use credmanager_vault::TokenAuth;
use tracing::warn;

use crate::api::AppState;

/// GET /health - 200 while the server's own Vault token is usable.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	match TokenAuth::new(state.vault.as_ref()).lookup_self().await {
		Ok(_) => (StatusCode::OK, Json(HealthResponse::healthy())),
		Err(err) => {
			warn!(error = %err, "vault token lookup failed");
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(HealthResponse::bad_token()),
			)
		}
	}
}
