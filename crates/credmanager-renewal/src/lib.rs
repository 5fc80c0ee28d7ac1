// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Renewal engine.
//!
//! A [`CredentialRenewer`] owns one [`RenewableCredential`] and one
//! [`RenewTimer`] and runs a single task that renews the credential at half
//! its validity window, backing off exponentially on failure. Successful
//! renewals are reported as [`RenewOutput`]s and failures as [`RenewError`]s
//! on two buffered channels. A [`RenewerMerger`] fans the channels of many
//! renewers into one pair so a process can watch every credential from a
//! single `select!` loop.

mod action;
mod credential;
mod error;
mod merger;
mod renewer;
mod timer;

pub use action::ReloadOrRestartUnit;
pub use credential::{BoxError, PostRenewAction, RenewOutput, RenewableCredential};
pub use error::RenewError;
pub use merger::RenewerMerger;
pub use renewer::{CredentialRenewer, Renewer, RenewerConfig, CHANNEL_CAPACITY};
pub use timer::{
	RenewTimer, DEFAULT_JITTER_PERCENT, DEFAULT_MAX_FAILURES, DEFAULT_WINDOW, MIN_FAIL_INTERVAL,
};
