// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Admission client against a mocked admission server and an in-memory
//! Vault that performs the unwrap.

use credmanager_common_core::TokenRequest;
use credmanager_common_http::RetryConfig;
use credmanager_credentials::{ClientError, CredmanagerClient};
use credmanager_vault::{MemoryVault, TokenAuth, TokenCreateRequest};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> TokenRequest {
	TokenRequest {
		hostname: "node-01".to_string(),
		policies: vec!["node-policy".to_string()],
	}
}

fn client(server: &MockServer, token_file: &Path) -> CredmanagerClient {
	CredmanagerClient::new(reqwest::Client::new(), &server.uri(), token_file)
		.unwrap()
		.with_retry(RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(1),
			max_delay: Duration::from_millis(5),
			backoff_factor: 2.0,
			jitter: false,
		})
}

async fn wrapped_token(vault: &MemoryVault) -> String {
	vault.set_role("credmanager-issuer", &["node-policy"]);
	let wrap = TokenAuth::new(vault)
		.create_wrapped_with_role(
			&TokenCreateRequest::with_policies(["node-policy"]),
			"credmanager-issuer",
			Duration::from_secs(300),
		)
		.await
		.unwrap();
	wrap.token.expose().clone()
}

#[tokio::test]
async fn fetches_unwraps_and_saves_token() {
	let server = MockServer::start().await;
	let vault = MemoryVault::new("hvs.bootstrap");
	let wrapping = wrapped_token(&vault).await;

	Mock::given(method("POST"))
		.and(path("/token"))
		.and(body_json(json!({ "Hostname": "node-01", "Policies": ["node-policy"] })))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({ "Token": wrapping })))
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let token_file = dir.path().join("token");
	let token = client(&server, &token_file)
		.get_token(&request(), &vault)
		.await
		.unwrap();

	assert_ne!(token.expose(), &wrapping);
	assert_eq!(
		vault.token_policies(token.expose()),
		Some(vec!["node-policy".to_string()])
	);
	assert_eq!(vault.outstanding_wraps(), 0);
	assert_eq!(std::fs::read_to_string(&token_file).unwrap(), *token.expose());

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let mode = std::fs::metadata(&token_file).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}
}

#[tokio::test]
async fn cached_token_skips_admission_server() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(500))
		.expect(0)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let token_file = dir.path().join("token");
	std::fs::write(&token_file, "hvs.cachedtoken123\n").unwrap();

	let vault = MemoryVault::new("hvs.bootstrap");
	let token = client(&server, &token_file)
		.get_token(&request(), &vault)
		.await
		.unwrap();
	assert_eq!(token.expose(), "hvs.cachedtoken123");
}

#[tokio::test]
async fn malformed_cached_token_is_ignored() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/token"))
		.respond_with(
			ResponseTemplate::new(403).set_body_json(json!({ "Message": "node is not active" })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let token_file = dir.path().join("token");
	std::fs::write(&token_file, "garbage").unwrap();

	let vault = MemoryVault::new("hvs.bootstrap");
	let err = client(&server, &token_file)
		.get_token(&request(), &vault)
		.await
		.unwrap_err();
	match err {
		ClientError::Denied(message) => assert_eq!(message, "node is not active"),
		other => panic!("expected Denied, got {other:?}"),
	}
}

#[tokio::test]
async fn bad_request_is_not_retried() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(
			ResponseTemplate::new(400).set_body_json(json!({ "Message": "invalid request body" })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let vault = MemoryVault::new("hvs.bootstrap");
	let err = client(&server, &dir.path().join("token"))
		.get_token(&request(), &vault)
		.await
		.unwrap_err();
	assert!(matches!(err, ClientError::BadRequest(_)));
}

#[tokio::test]
async fn server_errors_are_retried() {
	let server = MockServer::start().await;
	let vault = MemoryVault::new("hvs.bootstrap");
	let wrapping = wrapped_token(&vault).await;

	Mock::given(method("POST"))
		.respond_with(
			ResponseTemplate::new(500).set_body_json(json!({ "Message": "internal error" })),
		)
		.up_to_n_times(2)
		.with_priority(1)
		.expect(2)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({ "Token": wrapping })))
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let token = client(&server, &dir.path().join("token"))
		.get_token(&request(), &vault)
		.await
		.unwrap();
	assert!(token.expose().starts_with("hvs."));
}

#[tokio::test]
async fn unexpected_status_and_bad_token_format() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({ "Token": "not a token" })))
		.mount(&server)
		.await;

	let dir = tempfile::tempdir().unwrap();
	let vault = MemoryVault::new("hvs.bootstrap");
	let err = client(&server, &dir.path().join("token"))
		.get_token(&request(), &vault)
		.await
		.unwrap_err();
	assert!(matches!(err, ClientError::InvalidTokenFormat("wrapping")));

	let teapot = MockServer::start().await;
	Mock::given(method("POST"))
		.respond_with(ResponseTemplate::new(418))
		.mount(&teapot)
		.await;
	let err = client(&teapot, &dir.path().join("token"))
		.get_token(&request(), &vault)
		.await
		.unwrap_err();
	assert!(matches!(err, ClientError::Unexpected(status) if status.as_u16() == 418));
}
