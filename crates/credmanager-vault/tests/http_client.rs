// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! VaultClient against a mocked Vault HTTP API.

use credmanager_common_secret::SecretString;
use credmanager_vault::{
	AwsAuth, Ec2Metadata, Kv, KvVersion, Sys, TokenAuth, TokenCreateRequest, VaultApi, VaultClient,
	VaultError, Wrapping,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> VaultClient {
	VaultClient::new(&server.uri(), SecretString::from("hvs.service")).unwrap()
}

#[tokio::test]
async fn read_sends_token_and_decodes_data() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/data/nodes/bootable/n1"))
		.and(header("X-Vault-Token", "hvs.service"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": { "data": { "ttl": "1h" }, "metadata": { "version": 3 } }
		})))
		.mount(&server)
		.await;

	let kv = Kv::new(Arc::new(client(&server)), "secret", KvVersion::V2);
	let record = kv.read_latest("nodes/bootable/n1").await.unwrap().unwrap();
	assert_eq!(record.get("ttl"), Some(&json!("1h")));
}

#[tokio::test]
async fn missing_path_reads_as_none() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/data/absent"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
		.mount(&server)
		.await;

	let vault = client(&server);
	assert!(vault.read("secret/data/absent").await.unwrap().is_none());
}

#[tokio::test]
async fn errors_carry_status_and_messages() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/sys/policies/acl/credmanager-n1"))
		.respond_with(
			ResponseTemplate::new(403).set_body_json(json!({ "errors": ["permission denied"] })),
		)
		.mount(&server)
		.await;

	let vault = client(&server);
	let err = Sys::new(&vault)
		.put_policy("credmanager-n1", "path \"x\" {}")
		.await
		.unwrap_err();
	assert!(err.is_forbidden());
	match err {
		VaultError::Api { errors, path, .. } => {
			assert_eq!(errors, vec!["permission denied".to_string()]);
			assert_eq!(path, "sys/policies/acl/credmanager-n1");
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn wrapped_create_sends_wrap_ttl_header() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/auth/token/create/credmanager-issuer"))
		.and(header("X-Vault-Wrap-TTL", "300s"))
		.and(body_json(json!({ "policies": ["credmanager-n1"] })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"wrap_info": {
				"token": "hvs.wrapping",
				"ttl": 300,
				"creation_time": "2025-01-01T00:00:00Z",
				"creation_path": "auth/token/create/credmanager-issuer"
			}
		})))
		.mount(&server)
		.await;

	let vault = client(&server);
	let wrap = TokenAuth::new(&vault)
		.create_wrapped_with_role(
			&TokenCreateRequest::with_policies(["credmanager-n1"]),
			"credmanager-issuer",
			Duration::from_secs(300),
		)
		.await
		.unwrap();
	assert_eq!(wrap.token.expose(), "hvs.wrapping");
	assert_eq!(wrap.ttl, 300);
}

#[tokio::test]
async fn unwrap_and_renew_as_self_use_supplied_token() {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/sys/wrapping/unwrap"))
		.and(header("X-Vault-Token", "hvs.wrapping"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"auth": { "client_token": "hvs.node", "lease_duration": 7200, "renewable": true }
		})))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/v1/auth/token/renew-self"))
		.and(header("X-Vault-Token", "hvs.node"))
		.and(body_json(json!({ "increment": 3600 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"auth": { "client_token": "hvs.node", "lease_duration": 1800, "renewable": true }
		})))
		.mount(&server)
		.await;

	let vault = client(&server);
	let secret = Wrapping::new(&vault)
		.unwrap(&SecretString::from("hvs.wrapping"))
		.await
		.unwrap();
	let node_token = secret.auth.unwrap().client_token;
	assert_eq!(node_token.expose(), "hvs.node");

	let renewed = TokenAuth::new(&vault)
		.renew_as_self(&node_token, Duration::from_secs(3600))
		.await
		.unwrap();
	assert_eq!(renewed.lease_duration, 1800);
}

#[tokio::test]
async fn delete_accepts_no_content_and_list_uses_query() {
	let server = MockServer::start().await;
	Mock::given(method("DELETE"))
		.and(path("/v1/secret/data/nodes/bootable/n1"))
		.respond_with(ResponseTemplate::new(204))
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/v1/secret/metadata/nodes/bootable/"))
		.and(query_param("list", "true"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": { "keys": ["n1", "n2"] }
		})))
		.mount(&server)
		.await;

	let kv = Kv::new(Arc::new(client(&server)), "secret", KvVersion::V2);
	kv.delete_latest("nodes/bootable/n1").await.unwrap();
	assert_eq!(kv.list("nodes/bootable").await.unwrap(), vec!["n1", "n2"]);
}

#[tokio::test]
async fn lookup_self_returns_token_metadata() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/auth/token/lookup-self"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": { "ttl": 3000, "policies": ["default"] }
		})))
		.mount(&server)
		.await;

	let vault = client(&server);
	let data = TokenAuth::new(&vault).lookup_self().await.unwrap();
	assert_eq!(data.get("ttl"), Some(&json!(3000)));
}

#[tokio::test]
async fn health_accepts_standby_and_rejects_sealed() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/v1/sys/health"))
		.and(query_param("standbyok", "true"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"initialized": true,
			"sealed": false,
			"standby": true,
			"version": "1.15.2"
		})))
		.up_to_n_times(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/v1/sys/health"))
		.respond_with(ResponseTemplate::new(503).set_body_json(json!({
			"initialized": true,
			"sealed": true,
			"standby": true
		})))
		.mount(&server)
		.await;

	let vault = client(&server);
	let health = vault.health().await.unwrap();
	assert!(health.standby);
	assert_eq!(health.version, "1.15.2");

	let err = vault.health().await.unwrap_err();
	assert!(matches!(err, VaultError::Unhealthy { sealed: true, .. }));
	assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn health_fails_when_vault_is_unreachable() {
	let vault = VaultClient::new("http://127.0.0.1:1", SecretString::default()).unwrap();
	assert!(matches!(vault.health().await, Err(VaultError::Http(_))));
}

#[tokio::test]
async fn ec2_login_posts_identity_signature() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/latest/dynamic/instance-identity/pkcs7"))
		.respond_with(ResponseTemplate::new(200).set_body_string("MIAGCSqG\nSIb3DQEH\nAqCAMIAC\n"))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/v1/auth/aws/login"))
		.and(body_json(json!({
			"pkcs7": "MIAGCSqGSIb3DQEHAqCAMIAC",
			"role": "bar-worker",
			"nonce": "5defbf9e"
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"auth": {
				"client_token": "hvs.ec2",
				"policies": ["default", "bar-worker"],
				"lease_duration": 1800,
				"renewable": true
			}
		})))
		.mount(&server)
		.await;

	let http = reqwest::Client::new();
	let metadata = Ec2Metadata::new(http, &server.uri()).unwrap();
	let pkcs7 = metadata.pkcs7().await.unwrap();
	assert_eq!(pkcs7, "MIAGCSqGSIb3DQEHAqCAMIAC");

	let vault = VaultClient::new(&server.uri(), SecretString::default()).unwrap();
	let auth = AwsAuth::new(&vault)
		.login_ec2(&pkcs7, "bar-worker", Some("5defbf9e"))
		.await
		.unwrap();
	assert_eq!(auth.client_token.expose(), "hvs.ec2");
	assert_eq!(auth.lease(), Duration::from_secs(1800));
}

#[tokio::test]
async fn metadata_errors_are_reported() {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/latest/dynamic/instance-identity/pkcs7"))
		.respond_with(ResponseTemplate::new(404))
		.mount(&server)
		.await;

	let metadata = Ec2Metadata::new(reqwest::Client::new(), &server.uri()).unwrap();
	assert!(matches!(
		metadata.pkcs7().await,
		Err(VaultError::InstanceIdentity(_))
	));
}
