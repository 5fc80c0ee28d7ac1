// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use std::ffi::OsString;
use tokio::process::Command;
use tracing::{info, instrument};

use crate::credential::{BoxError, PostRenewAction};

/// Runs `systemctl reload-or-restart <unit>` so the unit picks up renewed
/// material.
#[derive(Debug, Clone)]
pub struct ReloadOrRestartUnit {
	unit: String,
	program: OsString,
}

impl ReloadOrRestartUnit {
	pub fn new(unit: impl Into<String>) -> Self {
		Self {
			unit: unit.into(),
			program: OsString::from("systemctl"),
		}
	}

	/// Use another executable in place of `systemctl`.
	pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
		self.program = program.into();
		self
	}

	pub fn unit(&self) -> &str {
		&self.unit
	}
}

#[async_trait]
impl PostRenewAction for ReloadOrRestartUnit {
	#[instrument(skip(self), fields(unit = %self.unit))]
	async fn execute(&self) -> Result<(), BoxError> {
		let output = Command::new(&self.program)
			.arg("reload-or-restart")
			.arg(&self.unit)
			.output()
			.await
			.map_err(|e| format!("failed to run {:?}: {e}", self.program))?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(format!(
				"reload-or-restart {} exited with {}: {}",
				self.unit,
				output.status,
				stderr.trim()
			)
			.into());
		}

		info!("reloaded unit");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn succeeds_when_program_exits_zero() {
		let action = ReloadOrRestartUnit::new("nginx.service").with_program("true");
		assert!(action.execute().await.is_ok());
	}

	#[tokio::test]
	async fn fails_when_program_exits_non_zero() {
		let action = ReloadOrRestartUnit::new("nginx.service").with_program("false");
		let err = action.execute().await.unwrap_err();
		assert!(err.to_string().contains("nginx.service"));
	}

	#[tokio::test]
	async fn fails_when_program_missing() {
		let action =
			ReloadOrRestartUnit::new("nginx.service").with_program("/nonexistent/systemctl");
		assert!(action.execute().await.is_err());
	}
}
