// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Admission errors and their HTTP responses.
//!
//! Response bodies carry only the fixed message of each variant. Details
//! are logged where the error is raised.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use credmanager_common_core::ErrorResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
	#[error("invalid request body")]
	BadRequest,

	#[error("unknown node")]
	UnknownNode,

	#[error("source address mismatch")]
	SourceMismatch,

	#[error("node already registered")]
	AlreadyRegistered,

	#[error("node is not active")]
	NotActive,

	#[error("policy mismatch")]
	PolicyMismatch,

	#[error("method not allowed")]
	MethodNotAllowed,

	#[error("internal error")]
	Internal,
}

impl ServerError {
	pub fn status(&self) -> StatusCode {
		match self {
			ServerError::BadRequest => StatusCode::BAD_REQUEST,
			ServerError::UnknownNode
			| ServerError::SourceMismatch
			| ServerError::AlreadyRegistered
			| ServerError::NotActive
			| ServerError::PolicyMismatch => StatusCode::FORBIDDEN,
			ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
			ServerError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		(self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
	}
}
