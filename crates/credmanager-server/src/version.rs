// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Build information.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn format_version_info() -> String {
	format!(
		"credmanager-server version: {}\n\
         Platform:                   {}-{}",
		VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_version() {
		assert!(format_version_info().contains(VERSION));
	}
}
