// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bounded retry with exponential backoff.
//!
//! Long-lived credentials are retried by the renewal engine. This helper is
//! for calls made before any renewer exists, such as fetching the daemon's
//! first Vault token from the admission server.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(30),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Statuses that indicate the remote side may recover on its own.
	pub fn is_retryable_status(status: StatusCode) -> bool {
		matches!(
			status,
			StatusCode::TOO_MANY_REQUESTS
				| StatusCode::REQUEST_TIMEOUT
				| StatusCode::INTERNAL_SERVER_ERROR
				| StatusCode::BAD_GATEWAY
				| StatusCode::SERVICE_UNAVAILABLE
				| StatusCode::GATEWAY_TIMEOUT
		)
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		self.status().is_some_and(RetryConfig::is_retryable_status)
	}
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponential = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped = exponential.min(cfg.max_delay.as_secs_f64());

	let delay = if cfg.jitter {
		capped * (0.5 + fastrand::f64())
	} else {
		capped
	};

	Duration::from_secs_f64(delay)
}

/// Runs `f` until it succeeds, returns a non-retryable error, or
/// `max_attempts` calls have been made.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut f: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Display,
{
	let mut attempt = 0;

	loop {
		match f().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				attempt += 1;

				if !err.is_retryable() {
					return Err(err);
				}

				if attempt >= cfg.max_attempts {
					warn!(
						error = %err,
						attempt,
						max_attempts = cfg.max_attempts,
						"retry attempts exhausted"
					);
					return Err(err);
				}

				let delay = calculate_delay(cfg, attempt - 1);
				warn!(
					error = %err,
					attempt,
					delay_ms = delay.as_millis() as u64,
					"retrying after transient error"
				);
				tokio::time::sleep(delay).await;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	struct FakeError {
		retryable: bool,
	}

	impl std::fmt::Display for FakeError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "fake error (retryable: {})", self.retryable)
		}
	}

	impl RetryableError for FakeError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	fn fast() -> RetryConfig {
		RetryConfig {
			max_attempts: 3,
			base_delay: Duration::from_millis(10),
			max_delay: Duration::from_millis(100),
			backoff_factor: 2.0,
			jitter: false,
		}
	}

	/// Purpose: a 403 from the admission server (window closed) must surface
	/// at once instead of being hammered.
	#[tokio::test(start_paused = true)]
	async fn non_retryable_error_is_returned_immediately() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), FakeError> = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { retryable: false })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn retryable_error_stops_at_max_attempts() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<(), FakeError> = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(FakeError { retryable: true })
			}
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn recovers_after_transient_failures() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);

		let result: Result<&str, FakeError> = retry(&fast(), || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(FakeError { retryable: true })
				} else {
					Ok("token")
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), "token");
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn delay_grows_then_caps() {
		let cfg = fast();
		assert_eq!(calculate_delay(&cfg, 0), Duration::from_millis(10));
		assert_eq!(calculate_delay(&cfg, 1), Duration::from_millis(20));
		assert_eq!(calculate_delay(&cfg, 10), Duration::from_millis(100));
	}

	#[test]
	fn jitter_stays_within_half_to_one_and_a_half() {
		let cfg = RetryConfig {
			jitter: true,
			..fast()
		};
		for _ in 0..100 {
			let delay = calculate_delay(&cfg, 1);
			assert!(delay >= Duration::from_millis(10));
			assert!(delay <= Duration::from_millis(30));
		}
	}

	#[test]
	fn server_errors_are_retryable_client_errors_are_not() {
		assert!(RetryConfig::is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
		assert!(RetryConfig::is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
		assert!(!RetryConfig::is_retryable_status(StatusCode::FORBIDDEN));
		assert!(!RetryConfig::is_retryable_status(StatusCode::BAD_REQUEST));
	}
}
