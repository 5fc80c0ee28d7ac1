// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Request timeout applied by [`new_client`]. Vault and admission calls are
/// small JSON exchanges; anything slower than this is treated as a failure
/// and left to the caller's retry policy.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a client with the credmanager User-Agent and [`DEFAULT_TIMEOUT`].
pub fn new_client() -> reqwest::Result<Client> {
	new_client_with_timeout(DEFAULT_TIMEOUT)
}

pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Client builder carrying the standard User-Agent header.
///
/// ```ignore
/// let client = credmanager_common_http::builder()
///     .danger_accept_invalid_certs(false)
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// `credmanager/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"credmanager/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
