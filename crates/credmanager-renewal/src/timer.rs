// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Renewal delay calculation.
//!
//! On success the next renewal is scheduled at half the validity window. On
//! the n-th consecutive failure the delay is `base * 2^(n-1)` with
//! `base = window / 2^(max_failures + 1)`, so even a saturated failure count
//! retries at a quarter of the window and never at or beyond it. A failure
//! delay is never shorter than [`MIN_FAIL_INTERVAL`], or a quarter of the
//! window when that is smaller. Every delay gets a uniform random splay of
//! `±jitter_percent`.

use std::time::Duration;
use tracing::warn;

/// Window substituted for a zero validity window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_FAILURES: u32 = 18;
pub const DEFAULT_JITTER_PERCENT: u32 = 10;
/// Shortest retry delay after a failure.
pub const MIN_FAIL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RenewTimer {
	fail_count: u32,
	max_failures: u32,
	jitter_percent: u32,
	default_window: Duration,
}

impl RenewTimer {
	/// A zero `window` is invalid; it is replaced by [`DEFAULT_WINDOW`] with
	/// a warning. `jitter_percent` is capped at 100.
	pub fn new(window: Duration, max_failures: u32, jitter_percent: u32) -> Self {
		let default_window = if window.is_zero() {
			warn!(
				default = ?DEFAULT_WINDOW,
				"renewal window is not positive, falling back to default"
			);
			DEFAULT_WINDOW
		} else {
			window
		};

		Self {
			fail_count: 0,
			max_failures: max_failures.min(62),
			jitter_percent: jitter_percent.min(100),
			default_window,
		}
	}

	pub fn with_defaults(window: Duration) -> Self {
		Self::new(window, DEFAULT_MAX_FAILURES, DEFAULT_JITTER_PERCENT)
	}

	pub fn fail_count(&self) -> u32 {
		self.fail_count
	}

	pub fn max_failures(&self) -> u32 {
		self.max_failures
	}

	pub fn default_window(&self) -> Duration {
		self.default_window
	}

	/// Delay before jitter. `fail_count` above the maximum is treated as the
	/// maximum.
	pub fn base_interval(&self, window: Duration, fail_count: u32) -> Duration {
		let window = if window.is_zero() {
			self.default_window
		} else {
			window
		};

		if fail_count == 0 {
			return window / 2;
		}

		let n = fail_count.min(self.max_failures);
		// window / 2^(max+1) * 2^(n-1) == window >> (max + 2 - n)
		let shift = self.max_failures + 2 - n;
		let nanos = window.as_nanos() >> shift;
		let backoff = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
		backoff.max(MIN_FAIL_INTERVAL.min(window / 4))
	}

	/// Delay including a random splay of `±jitter_percent` of the base.
	pub fn interval(&self, window: Duration, fail_count: u32) -> Duration {
		let base = self.base_interval(window, fail_count);
		apply_splay(base, self.jitter_percent)
	}

	/// Records a failure and returns the backoff delay.
	pub fn fail_reset(&mut self, window: Duration) -> Duration {
		self.fail_count = self.fail_count.saturating_add(1).min(self.max_failures);
		self.interval(window, self.fail_count)
	}

	/// Clears the failure count and returns the regular renewal delay.
	pub fn reset(&mut self, window: Duration) -> Duration {
		self.fail_count = 0;
		self.interval(window, 0)
	}
}

fn apply_splay(interval: Duration, jitter_percent: u32) -> Duration {
	let nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
	let spread = (u128::from(nanos) * u128::from(jitter_percent) / 100) as u64;
	if spread == 0 {
		return interval;
	}
	let offset = fastrand::u64(0..spread.saturating_mul(2));
	let jittered = if offset >= spread {
		nanos.saturating_add(offset - spread)
	} else {
		nanos - (spread - offset)
	};
	Duration::from_nanos(jittered)
}
