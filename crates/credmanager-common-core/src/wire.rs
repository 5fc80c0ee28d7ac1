// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! JSON bodies exchanged with the admission server.
//!
//! Field names are capitalised on the wire (`Hostname`, `Policies`, `Token`,
//! `Message`); the health body uses a lowercase `status`.

use credmanager_common_secret::SecretString;
use serde::{Deserialize, Serialize};

/// Path of the token issuance endpoint.
pub const TOKEN_PATH: &str = "/token";
/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Body of `POST /token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
	#[serde(rename = "Hostname")]
	pub hostname: String,
	#[serde(rename = "Policies", default)]
	pub policies: Vec<String>,
}

/// `201 Created` body. `token` is a response-wrapping token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	#[serde(
		rename = "Token",
		serialize_with = "credmanager_common_secret::serde_expose::serialize"
	)]
	pub token: SecretString,
}

/// Body of every non-2xx admission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	#[serde(rename = "Message")]
	pub message: String,
}

impl ErrorResponse {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
}

impl HealthResponse {
	pub const HEALTHY: &'static str = "healthy";
	pub const BAD_TOKEN: &'static str = "expired or bad token";

	pub fn healthy() -> Self {
		Self {
			status: Self::HEALTHY.to_string(),
		}
	}

	pub fn bad_token() -> Self {
		Self {
			status: Self::BAD_TOKEN.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_uses_capitalised_fields() {
		let req = TokenRequest {
			hostname: "node-01".to_string(),
			policies: vec!["bar-worker-ssh-cert".to_string()],
		};
		assert_eq!(
			serde_json::to_string(&req).unwrap(),
			r#"{"Hostname":"node-01","Policies":["bar-worker-ssh-cert"]}"#
		);
	}

	#[test]
	fn request_policies_default_to_empty() {
		let req: TokenRequest = serde_json::from_str(r#"{"Hostname":"node-01"}"#).unwrap();
		assert_eq!(req.hostname, "node-01");
		assert!(req.policies.is_empty());
	}

	#[test]
	fn request_without_hostname_is_rejected() {
		assert!(serde_json::from_str::<TokenRequest>(r#"{"Policies":[]}"#).is_err());
	}

	#[test]
	fn response_token_is_sent_in_clear() {
		let resp = TokenResponse {
			token: SecretString::from("s.wrapped"),
		};
		assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"Token":"s.wrapped"}"#);
		assert!(!format!("{resp:?}").contains("s.wrapped"));

		let back: TokenResponse = serde_json::from_str(r#"{"Token":"s.other"}"#).unwrap();
		assert_eq!(back.token.expose(), "s.other");
	}

	#[test]
	fn error_and_health_bodies() {
		assert_eq!(
			serde_json::to_string(&ErrorResponse::new("not activated")).unwrap(),
			r#"{"Message":"not activated"}"#
		);
		assert_eq!(
			serde_json::to_string(&HealthResponse::healthy()).unwrap(),
			r#"{"status":"healthy"}"#
		);
		assert_eq!(
			serde_json::to_string(&HealthResponse::bad_token()).unwrap(),
			r#"{"status":"expired or bad token"}"#
		);
	}
}
