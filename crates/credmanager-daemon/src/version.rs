// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn format_version_info() -> String {
	format!(
		"credmanager version: {}\n\
         Platform:            {}-{}",
		VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH,
	)
}
