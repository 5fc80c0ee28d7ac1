// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-credential renewal loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credential::{PostRenewAction, RenewOutput, RenewableCredential};
use crate::error::RenewError;
use crate::timer::{RenewTimer, DEFAULT_JITTER_PERCENT, DEFAULT_MAX_FAILURES};

/// Buffer size of both output channels.
pub const CHANNEL_CAPACITY: usize = 100;

/// Source of renewal reports and errors that can be merged and stopped.
pub trait Renewer: Send {
	/// The success channel. `None` once it has been taken.
	fn take_renew_rx(&mut self) -> Option<mpsc::Receiver<RenewOutput>>;

	/// The error channel. `None` once it has been taken.
	fn take_done_rx(&mut self) -> Option<mpsc::Receiver<RenewError>>;

	/// Asks the renewer to stop. Returns without waiting.
	fn stop(&self);
}

#[derive(Debug, Clone)]
pub struct RenewerConfig {
	pub max_failures: u32,
	pub jitter_percent: u32,
	/// Delay before the first renewal.
	pub initial_delay: Duration,
}

impl Default for RenewerConfig {
	fn default() -> Self {
		Self {
			max_failures: DEFAULT_MAX_FAILURES,
			jitter_percent: DEFAULT_JITTER_PERCENT,
			initial_delay: Duration::ZERO,
		}
	}
}

struct Pending {
	credential: Box<dyn RenewableCredential>,
	action: Option<Arc<dyn PostRenewAction>>,
	renew_tx: mpsc::Sender<RenewOutput>,
	done_tx: mpsc::Sender<RenewError>,
}

/// Keeps one credential valid until stopped.
///
/// Created idle; [`CredentialRenewer::renew`] starts the loop. Renewals of
/// the credential are strictly serialized. [`Renewer::stop`] is cooperative:
/// an in-flight renewal finishes before the loop exits.
pub struct CredentialRenewer {
	name: String,
	config: RenewerConfig,
	pending: Option<Pending>,
	renew_rx: Option<mpsc::Receiver<RenewOutput>>,
	done_rx: Option<mpsc::Receiver<RenewError>>,
	cancel: CancellationToken,
	handle: Option<JoinHandle<()>>,
}

impl CredentialRenewer {
	pub fn new<C>(credential: C, action: Option<Arc<dyn PostRenewAction>>) -> Self
	where
		C: RenewableCredential + 'static,
	{
		Self::with_config(credential, action, RenewerConfig::default())
	}

	pub fn with_config<C>(
		credential: C,
		action: Option<Arc<dyn PostRenewAction>>,
		config: RenewerConfig,
	) -> Self
	where
		C: RenewableCredential + 'static,
	{
		let (renew_tx, renew_rx) = mpsc::channel(CHANNEL_CAPACITY);
		let (done_tx, done_rx) = mpsc::channel(CHANNEL_CAPACITY);
		Self {
			name: credential.to_string(),
			config,
			pending: Some(Pending {
				credential: Box::new(credential),
				action,
				renew_tx,
				done_tx,
			}),
			renew_rx: Some(renew_rx),
			done_rx: Some(done_rx),
			cancel: CancellationToken::new(),
			handle: None,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Spawns the renewal loop. Later calls are no-ops.
	pub fn renew(&mut self) {
		let Some(pending) = self.pending.take() else {
			debug!(credential = %self.name, "renewer already started");
			return;
		};
		let config = self.config.clone();
		let cancel = self.cancel.clone();
		self.handle = Some(tokio::spawn(run(pending, config, cancel)));
		info!(credential = %self.name, "started credential renewer");
	}

	pub fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| !h.is_finished())
	}

	/// Waits for the loop to exit. Call after [`Renewer::stop`].
	pub async fn join(&mut self) {
		if let Some(handle) = self.handle.take() {
			if let Err(err) = handle.await {
				warn!(credential = %self.name, error = %err, "renewer task failed");
			}
		}
	}
}

impl Renewer for CredentialRenewer {
	fn take_renew_rx(&mut self) -> Option<mpsc::Receiver<RenewOutput>> {
		self.renew_rx.take()
	}

	fn take_done_rx(&mut self) -> Option<mpsc::Receiver<RenewError>> {
		self.done_rx.take()
	}

	fn stop(&self) {
		self.cancel.cancel();
	}
}

impl Drop for CredentialRenewer {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

async fn emit<T>(tx: &mpsc::Sender<T>, value: T, cancel: &CancellationToken) {
	tokio::select! {
		_ = cancel.cancelled() => {}
		sent = tx.send(value) => {
			if sent.is_err() {
				debug!("renewal channel receiver dropped");
			}
		}
	}
}

async fn run(pending: Pending, config: RenewerConfig, cancel: CancellationToken) {
	let Pending {
		mut credential,
		action,
		renew_tx,
		done_tx,
	} = pending;

	let mut timer = RenewTimer::new(
		credential.max_renew_interval(),
		config.max_failures,
		config.jitter_percent,
	);
	let mut delay = config.initial_delay;
	let mut consecutive_failures: u32 = 0;
	let mut exceeded_reported = false;

	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = tokio::time::sleep(delay) => {}
		}

		let name = credential.to_string();

		let failure = match credential.renew().await {
			Err(source) => Some(RenewError::Renew {
				credential: name.clone(),
				source,
			}),
			Ok(()) => match &action {
				Some(action) => action.execute().await.err().map(|source| {
					RenewError::PostRenewAction {
						credential: name.clone(),
						source,
					}
				}),
				None => None,
			},
		};

		if let Some(err) = failure {
			consecutive_failures = consecutive_failures.saturating_add(1);
			warn!(
				credential = %name,
				error = %err,
				consecutive_failures,
				"credential renewal failed"
			);
			emit(&done_tx, err, &cancel).await;

			if consecutive_failures > config.max_failures && !exceeded_reported {
				exceeded_reported = true;
				emit(
					&done_tx,
					RenewError::MaxRetriesExceeded {
						max_retries: config.max_failures,
						credential: name.clone(),
					},
					&cancel,
				)
				.await;
			}

			delay = timer.fail_reset(credential.max_renew_interval());
			debug!(credential = %name, retry_in = ?delay, "scheduled retry");
			continue;
		}

		consecutive_failures = 0;
		exceeded_reported = false;
		emit(&renew_tx, RenewOutput::new(name.clone()), &cancel).await;

		delay = timer.reset(credential.max_renew_interval());
		debug!(credential = %name, next_renewal_in = ?delay, "scheduled renewal");
	}

	info!(credential = %credential, "credential renewer stopped");
}
