// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use credmanager_vault::{Data, Kv};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{ActivationError, Result};
use crate::record::ActivationRecord;

/// Status line for a node without a record.
pub fn not_found_status(key: &str) -> String {
	format!("record for {key} not found")
}

/// Activation records under `<base_path>/<node id>` in a KV mount.
///
/// Concurrent activations of the same node are last-write-wins.
#[derive(Debug)]
pub struct NodeActivationStore {
	kv: Kv,
	base_path: String,
}

impl NodeActivationStore {
	pub fn new(kv: Kv, base_path: impl Into<String>) -> Self {
		Self {
			kv,
			base_path: base_path.into().trim_matches('/').to_string(),
		}
	}

	pub fn base_path(&self) -> &str {
		&self.base_path
	}

	fn path(&self, key: &str) -> Result<String> {
		let valid = !key.is_empty()
			&& key
				.split('/')
				.all(|segment| !segment.is_empty() && segment != "." && segment != "..");
		if !valid {
			return Err(ActivationError::InvalidKey(key.to_string()));
		}
		if self.base_path.is_empty() {
			Ok(key.to_string())
		} else {
			Ok(format!("{}/{}", self.base_path, key))
		}
	}

	/// Opens a window of `ttl` starting now, replacing any previous record.
	pub async fn activate(&self, key: &str, ttl: Duration) -> Result<()> {
		self.write(key, ActivationRecord::new(ttl, Utc::now())).await
	}

	/// Like [`activate`](Self::activate), but admission leaves the window
	/// open until it expires.
	pub async fn activate_replayable(&self, key: &str, ttl: Duration) -> Result<()> {
		self.write(key, ActivationRecord::new(ttl, Utc::now()).replayable())
			.await
	}

	#[instrument(skip(self, record), fields(ttl = ?record.ttl, replayable = record.skip_deactivation))]
	async fn write(&self, key: &str, record: ActivationRecord) -> Result<()> {
		if record.ttl.is_zero() {
			return Err(ActivationError::InvalidTtl);
		}
		let path = self.path(key)?;
		let data = match serde_json::to_value(&record) {
			Ok(Value::Object(map)) => map,
			Ok(_) => Data::new(),
			Err(source) => {
				return Err(ActivationError::Decode {
					key: key.to_string(),
					source,
				})
			}
		};
		self.kv.write(&path, data).await?;
		info!(node = key, "activated node");
		Ok(())
	}

	/// The stored record, `None` if there is none.
	pub async fn record(&self, key: &str) -> Result<Option<ActivationRecord>> {
		let path = self.path(key)?;
		let Some(data) = self.kv.read_latest(&path).await? else {
			return Ok(None);
		};
		serde_json::from_value(Value::Object(data))
			.map(Some)
			.map_err(|source| ActivationError::Decode {
				key: key.to_string(),
				source,
			})
	}

	/// Whether `key` may be admitted now. Any failure reads as inactive.
	pub async fn active(&self, key: &str) -> bool {
		self.active_at(key, Utc::now()).await
	}

	pub async fn active_at(&self, key: &str, now: DateTime<Utc>) -> bool {
		match self.record(key).await {
			Ok(Some(record)) => record.is_active_at(now),
			Ok(None) => {
				debug!(node = key, "no activation record");
				false
			}
			Err(err) => {
				warn!(node = key, error = %err, "failed to read activation record");
				false
			}
		}
	}

	/// Closes the window. Replayable records are left in place.
	#[instrument(skip(self))]
	pub async fn deactivate(&self, key: &str) -> Result<()> {
		let path = self.path(key)?;
		match self.record(key).await {
			Ok(Some(record)) if record.skip_deactivation => {
				debug!(node = key, "record is replayable, leaving it active");
				return Ok(());
			}
			Ok(_) => {}
			// A corrupt record is removed like any other.
			Err(ActivationError::Decode { .. }) => {}
			Err(err) => return Err(err),
		}
		self.kv.delete_latest(&path).await?;
		info!(node = key, "deactivated node");
		Ok(())
	}

	/// Human-readable state of `key`.
	pub async fn status(&self, key: &str) -> Result<String> {
		let record = match self.record(key).await? {
			Some(record) => record,
			None => return Ok(not_found_status(key)),
		};
		let state = if record.is_active_at(Utc::now()) {
			"active"
		} else {
			"inactive"
		};
		Ok(format!("{key}: {state} {record}"))
	}
}
