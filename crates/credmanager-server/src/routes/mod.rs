// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod health;
pub mod token;

use crate::error::ServerError;

pub async fn method_not_allowed() -> ServerError {
	ServerError::MethodNotAllowed
}
