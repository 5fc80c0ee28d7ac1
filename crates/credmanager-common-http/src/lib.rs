// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for credmanager.
//!
//! - a `reqwest` client builder with a consistent User-Agent
//! - bounded retry with exponential backoff for one-shot calls that have no
//!   renewal loop behind them (daemon bootstrap)
//! - client certificate loading for mutual TLS

mod client;
mod retry;
mod tls;

pub use client::{builder, new_client, new_client_with_timeout, user_agent, DEFAULT_TIMEOUT};
pub use retry::{retry, RetryConfig, RetryableError};
pub use tls::{identity_from_pem_files, TlsError};
