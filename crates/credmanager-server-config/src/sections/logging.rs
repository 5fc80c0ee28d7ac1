// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Logging and shutdown configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

impl std::str::FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"text" | "pretty" => Ok(LogFormat::Text),
			"json" => Ok(LogFormat::Json),
			other => Err(format!("unknown log format '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
	pub format: Option<LogFormat>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(|| "info".to_string()),
			format: self.format.unwrap_or_default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		LoggingConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShutdownConfigLayer {
	pub grace_period_secs: Option<u64>,
}

impl ShutdownConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.grace_period_secs.is_some() {
			self.grace_period_secs = other.grace_period_secs;
		}
	}

	pub fn finalize(self) -> ShutdownConfig {
		ShutdownConfig {
			grace_period_secs: self.grace_period_secs.unwrap_or(10),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShutdownConfig {
	pub grace_period_secs: u64,
}

impl ShutdownConfig {
	pub fn grace_period(&self) -> Duration {
		Duration::from_secs(self.grace_period_secs)
	}
}

impl Default for ShutdownConfig {
	fn default() -> Self {
		ShutdownConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn log_format_parsing() {
		assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
		assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
		assert!("xml".parse::<LogFormat>().is_err());
	}

	#[test]
	fn defaults() {
		let logging = LoggingConfig::default();
		assert_eq!(logging.level, "info");
		assert_eq!(logging.format, LogFormat::Text);
		assert_eq!(ShutdownConfig::default().grace_period(), Duration::from_secs(10));
	}
}
