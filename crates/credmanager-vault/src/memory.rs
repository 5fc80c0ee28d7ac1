// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory [`VaultApi`] for tests.
//!
//! Generic paths behave like a KV store: a write stores the body, a read
//! returns it as `data`. The token, wrapping and role endpoints that
//! credmanager relies on are emulated closely enough to exercise issuance
//! and renewal end to end.

use async_trait::async_trait;
use credmanager_common_secret::SecretString;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::VaultApi;
use crate::error::{Result, VaultError};
use crate::types::{Data, SecretAuth, VaultSecret, WrapInfo};

const DEFAULT_TOKEN_TTL: u64 = 3600;

#[derive(Debug, Clone)]
struct TokenEntry {
	policies: Vec<String>,
	ttl: u64,
	display_name: Option<String>,
}

#[derive(Default)]
struct State {
	own_token: String,
	tokens: HashMap<String, TokenEntry>,
	store: BTreeMap<String, Value>,
	wrapped: HashMap<String, VaultSecret>,
	failing: Vec<String>,
	failing_deletes: Vec<String>,
	counter: u64,
}

impl State {
	fn next_token(&mut self, prefix: &str) -> String {
		self.counter += 1;
		format!("{prefix}{:024}", self.counter)
	}

	fn check_failure(&self, path: &str) -> Result<()> {
		if self.failing.iter().any(|p| path.starts_with(p.as_str())) {
			return Err(api_error(500, path, "injected failure"));
		}
		Ok(())
	}

	fn authenticate(&self, token: &str, path: &str) -> Result<TokenEntry> {
		self.tokens
			.get(token)
			.cloned()
			.ok_or_else(|| api_error(403, path, "permission denied"))
	}

	fn issue(&mut self, data: &Value) -> SecretAuth {
		let (policies, ttl) = token_params(data);
		let token = self.next_token("hvs.");
		self.tokens.insert(
			token.clone(),
			TokenEntry {
				policies: policies.clone(),
				ttl,
				display_name: data
					.get("display_name")
					.and_then(Value::as_str)
					.map(|n| format!("token-{n}")),
			},
		);
		SecretAuth {
			client_token: SecretString::new(token),
			accessor: String::new(),
			policies,
			lease_duration: ttl,
			renewable: true,
		}
	}

	fn execute(&mut self, token: &str, path: &str, data: Value) -> Result<Option<VaultSecret>> {
		self.check_failure(path)?;

		if path == "sys/wrapping/unwrap" {
			return self
				.wrapped
				.remove(token)
				.map(Some)
				.ok_or_else(|| api_error(400, path, "wrapping token is not valid or does not exist"));
		}

		let caller = self.authenticate(token, path)?;

		if path == "auth/token/renew-self" {
			let increment = data.get("increment").and_then(Value::as_u64).unwrap_or(0);
			let ttl = if increment > 0 { increment } else { caller.ttl };
			if let Some(entry) = self.tokens.get_mut(token) {
				entry.ttl = ttl;
			}
			return Ok(Some(VaultSecret {
				auth: Some(SecretAuth {
					client_token: SecretString::new(token.to_string()),
					accessor: String::new(),
					policies: caller.policies,
					lease_duration: ttl,
					renewable: true,
				}),
				..Default::default()
			}));
		}

		if path == "auth/token/create" {
			return Ok(Some(VaultSecret {
				auth: Some(self.issue(&data)),
				..Default::default()
			}));
		}

		if let Some(role) = path.strip_prefix("auth/token/create/") {
			let role_path = format!("auth/token/roles/{role}");
			let Some(role_data) = self.store.get(&role_path).cloned() else {
				return Err(api_error(400, path, &format!("unknown role {role}")));
			};
			let allowed: Vec<String> = role_data
				.get("allowed_policies")
				.and_then(Value::as_array)
				.map(|a| a.iter().filter_map(|p| p.as_str().map(str::to_string)).collect())
				.unwrap_or_default();
			let (policies, _) = token_params(&data);
			if let Some(bad) = policies.iter().find(|p| !allowed.contains(p)) {
				return Err(api_error(
					400,
					path,
					&format!("token policies (\"{bad}\") must be subset of the role's allowed policies"),
				));
			}
			return Ok(Some(VaultSecret {
				auth: Some(self.issue(&data)),
				..Default::default()
			}));
		}

		self.store.insert(path.to_string(), data);
		Ok(None)
	}
}

fn token_params(data: &Value) -> (Vec<String>, u64) {
	let policies = data
		.get("policies")
		.and_then(Value::as_array)
		.map(|a| a.iter().filter_map(|p| p.as_str().map(str::to_string)).collect())
		.unwrap_or_default();
	let ttl = data
		.get("ttl")
		.and_then(Value::as_str)
		.and_then(|t| t.trim_end_matches('s').parse().ok())
		.unwrap_or(DEFAULT_TOKEN_TTL);
	(policies, ttl)
}

fn api_error(status: u16, path: &str, message: &str) -> VaultError {
	VaultError::Api {
		status,
		path: path.to_string(),
		errors: vec![message.to_string()],
	}
}

/// In-memory Vault double.
pub struct MemoryVault {
	state: Mutex<State>,
}

impl MemoryVault {
	/// A vault whose own token is `own_token`, holding the `root` policy.
	pub fn new(own_token: &str) -> Self {
		let mut state = State {
			own_token: own_token.to_string(),
			..Default::default()
		};
		state.tokens.insert(
			own_token.to_string(),
			TokenEntry {
				policies: vec!["root".to_string()],
				ttl: 0,
				display_name: Some("root".to_string()),
			},
		);
		Self {
			state: Mutex::new(state),
		}
	}

	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn contains(&self, path: &str) -> bool {
		self.state().store.contains_key(path)
	}

	/// Raw body last written to `path`.
	pub fn get(&self, path: &str) -> Option<Value> {
		self.state().store.get(path).cloned()
	}

	pub fn put(&self, path: &str, value: Value) {
		self.state().store.insert(path.to_string(), value);
	}

	/// Defines a token role at `auth/token/roles/<name>`.
	pub fn set_role(&self, name: &str, allowed_policies: &[&str]) {
		self.put(
			&format!("auth/token/roles/{name}"),
			json!({ "allowed_policies": allowed_policies }),
		);
	}

	/// Registers an additional valid token.
	pub fn add_token(&self, token: &str, policies: &[&str], ttl: Duration) {
		self.state().tokens.insert(
			token.to_string(),
			TokenEntry {
				policies: policies.iter().map(|p| p.to_string()).collect(),
				ttl: ttl.as_secs(),
				display_name: None,
			},
		);
	}

	pub fn revoke(&self, token: &str) {
		self.state().tokens.remove(token);
	}

	pub fn token_policies(&self, token: &str) -> Option<Vec<String>> {
		self.state().tokens.get(token).map(|t| t.policies.clone())
	}

	pub fn token_display_name(&self, token: &str) -> Option<String> {
		self.state()
			.tokens
			.get(token)
			.and_then(|t| t.display_name.clone())
	}

	pub fn token_ttl(&self, token: &str) -> Option<Duration> {
		self.state()
			.tokens
			.get(token)
			.map(|t| Duration::from_secs(t.ttl))
	}

	/// Number of wrapped responses not yet unwrapped.
	pub fn outstanding_wraps(&self) -> usize {
		self.state().wrapped.len()
	}

	/// Every operation on a path starting with `prefix` fails with a 500.
	pub fn fail_path(&self, prefix: &str) {
		self.state().failing.push(prefix.to_string());
	}

	/// Deletes under `prefix` fail with a 500; reads and writes still work.
	pub fn fail_deletes(&self, prefix: &str) {
		self.state().failing_deletes.push(prefix.to_string());
	}

	pub fn clear_failures(&self) {
		let mut state = self.state();
		state.failing.clear();
		state.failing_deletes.clear();
	}
}

#[async_trait]
impl VaultApi for MemoryVault {
	async fn read(&self, path: &str) -> Result<Option<VaultSecret>> {
		let state = self.state();
		state.check_failure(path)?;

		if path == "auth/token/lookup-self" {
			let entry = state.authenticate(&state.own_token, path)?;
			let mut data = Data::new();
			data.insert("policies".to_string(), json!(entry.policies));
			data.insert("ttl".to_string(), json!(entry.ttl));
			return Ok(Some(VaultSecret {
				data: Some(data),
				..Default::default()
			}));
		}

		Ok(state.store.get(path).map(|value| VaultSecret {
			data: value.as_object().cloned(),
			..Default::default()
		}))
	}

	async fn write(&self, path: &str, data: Value) -> Result<Option<VaultSecret>> {
		let mut state = self.state();
		let token = state.own_token.clone();
		state.execute(&token, path, data)
	}

	async fn write_wrapped(&self, path: &str, data: Value, wrap_ttl: Duration) -> Result<WrapInfo> {
		let mut state = self.state();
		let token = state.own_token.clone();
		let secret = state.execute(&token, path, data)?.unwrap_or_default();
		let wrapping_token = state.next_token("hvs.");
		state.wrapped.insert(wrapping_token.clone(), secret);
		Ok(WrapInfo {
			token: SecretString::new(wrapping_token),
			accessor: String::new(),
			ttl: wrap_ttl.as_secs(),
			creation_time: String::new(),
			creation_path: path.to_string(),
		})
	}

	async fn write_as(
		&self,
		token: &SecretString,
		path: &str,
		data: Value,
	) -> Result<Option<VaultSecret>> {
		self.state().execute(token.expose(), path, data)
	}

	async fn delete(&self, path: &str) -> Result<()> {
		let mut state = self.state();
		state.check_failure(path)?;
		if state.failing_deletes.iter().any(|p| path.starts_with(p.as_str())) {
			return Err(api_error(500, path, "injected delete failure"));
		}
		state.store.remove(path);
		Ok(())
	}

	async fn list(&self, path: &str) -> Result<Vec<String>> {
		let state = self.state();
		state.check_failure(path)?;
		let prefix = format!("{}/", path.trim_end_matches('/').replacen("/metadata/", "/data/", 1));
		let mut keys: Vec<String> = state
			.store
			.keys()
			.filter_map(|k| k.strip_prefix(&prefix))
			.map(|rest| match rest.split_once('/') {
				Some((dir, _)) => format!("{dir}/"),
				None => rest.to_string(),
			})
			.collect();
		keys.dedup();
		Ok(keys)
	}
}
