// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Rendered templates.
//!
//! Unlike the other credentials, a template is not renewed on a timer. A
//! [`TemplateRunner`] watches the secrets a template references and
//! re-renders the output whenever they change. [`TemplateRenewer`] adapts
//! the runner's event stream into the [`Renewer`] contract so templates sit
//! in the same [`credmanager_renewal::RenewerMerger`] as everything else.
//!
//! The built-in [`KvTemplateRunner`] understands one placeholder:
//!
//! ```text
//! password = "{{ kv "database/app" "password" }}"
//! ```

use chrono::{DateTime, Utc};
use credmanager_renewal::{
	BoxError, PostRenewAction, RenewError, RenewOutput, Renewer, CHANNEL_CAPACITY,
};
use credmanager_vault::Kv;
use regex::{Captures, Regex};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CredentialError, Result};
use crate::file::CredentialFile;

static KV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"\{\{\s*kv\s+"([^"]+)"\s+"([^"]+)"\s*\}\}"#).unwrap()
});

/// The output file was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEvent {
	pub destination: PathBuf,
	pub rendered_at: DateTime<Utc>,
}

pub struct RunnerChannels {
	pub events: mpsc::Receiver<RenderEvent>,
	pub errors: mpsc::Receiver<BoxError>,
}

/// Keeps a rendered file in sync with its upstream secrets.
pub trait TemplateRunner: Send {
	fn destination(&self) -> &Path;

	/// Starts watching. Both channels close after `cancel` fires.
	fn start(self: Box<Self>, cancel: CancellationToken) -> RunnerChannels;
}

/// Polls the KV secrets referenced by a template.
pub struct KvTemplateRunner {
	source: PathBuf,
	destination: CredentialFile,
	kv: Kv,
	poll_interval: Duration,
}

impl KvTemplateRunner {
	pub fn new(
		source: impl Into<PathBuf>,
		destination: CredentialFile,
		kv: Kv,
		poll_interval: Duration,
	) -> Self {
		Self {
			source: source.into(),
			destination,
			kv,
			poll_interval,
		}
	}

	/// Renders the template once without writing it.
	pub async fn render(&self) -> Result<String> {
		let template = tokio::fs::read_to_string(&self.source)
			.await
			.map_err(|e| CredentialError::io(&self.source, e))?;

		let placeholders: Vec<(String, String)> = KV_PLACEHOLDER
			.captures_iter(&template)
			.map(|caps| (caps[1].to_string(), caps[2].to_string()))
			.collect();

		let mut values = Vec::with_capacity(placeholders.len());
		for (key, field) in &placeholders {
			let data = self.kv.read_latest(key).await?.ok_or_else(|| {
				CredentialError::Template(format!("secret {key} not found in {}", self.kv.mount()))
			})?;
			let value = match data.get(field.as_str()) {
				Some(Value::String(s)) => s.clone(),
				Some(other) => other.to_string(),
				None => {
					return Err(CredentialError::Template(format!(
						"secret {key} has no field {field}"
					)))
				}
			};
			values.push(value);
		}

		let mut values = values.into_iter();
		Ok(KV_PLACEHOLDER
			.replace_all(&template, |_: &Captures| values.next().unwrap_or_default())
			.into_owned())
	}

	async fn run(
		self,
		cancel: CancellationToken,
		events: mpsc::Sender<RenderEvent>,
		errors: mpsc::Sender<BoxError>,
	) {
		let mut last = self.destination.read().ok().flatten();

		loop {
			match self.render().await {
				Ok(content) if last.as_deref() == Some(content.as_str()) => {
					debug!(destination = %self.destination.path.display(), "template unchanged");
				}
				Ok(content) => match self.destination.write(&content) {
					Ok(()) => {
						last = Some(content);
						let event = RenderEvent {
							destination: self.destination.path.clone(),
							rendered_at: Utc::now(),
						};
						tokio::select! {
							_ = cancel.cancelled() => break,
							_ = events.send(event) => {}
						}
					}
					Err(err) => {
						let err = CredentialError::io(&self.destination.path, err);
						tokio::select! {
							_ = cancel.cancelled() => break,
							_ = errors.send(err.into()) => {}
						}
					}
				},
				Err(err) => {
					tokio::select! {
						_ = cancel.cancelled() => break,
						_ = errors.send(err.into()) => {}
					}
				}
			}

			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(self.poll_interval) => {}
			}
		}
	}
}

impl TemplateRunner for KvTemplateRunner {
	fn destination(&self) -> &Path {
		&self.destination.path
	}

	fn start(self: Box<Self>, cancel: CancellationToken) -> RunnerChannels {
		let (events_tx, events) = mpsc::channel(CHANNEL_CAPACITY);
		let (errors_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);
		tokio::spawn((*self).run(cancel, events_tx, errors_tx));
		RunnerChannels { events, errors }
	}
}

struct Pending {
	runner: Box<dyn TemplateRunner>,
	action: Option<Arc<dyn PostRenewAction>>,
	renew_tx: mpsc::Sender<RenewOutput>,
	done_tx: mpsc::Sender<RenewError>,
}

/// Exposes a [`TemplateRunner`] as a [`Renewer`].
///
/// Every render event runs the post-render action and is then reported as
/// a [`RenewOutput`] with the message `render completed`. Runner errors are
/// reported as [`RenewError::Render`].
pub struct TemplateRenewer {
	name: String,
	pending: Option<Pending>,
	renew_rx: Option<mpsc::Receiver<RenewOutput>>,
	done_rx: Option<mpsc::Receiver<RenewError>>,
	cancel: CancellationToken,
	handle: Option<JoinHandle<()>>,
}

impl TemplateRenewer {
	pub fn new(runner: Box<dyn TemplateRunner>, action: Option<Arc<dyn PostRenewAction>>) -> Self {
		let (renew_tx, renew_rx) = mpsc::channel(CHANNEL_CAPACITY);
		let (done_tx, done_rx) = mpsc::channel(CHANNEL_CAPACITY);
		Self {
			name: format!("Template for: {}", runner.destination().display()),
			pending: Some(Pending {
				runner,
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

	/// Starts the runner. Later calls are no-ops.
	pub fn renew(&mut self) {
		let Some(pending) = self.pending.take() else {
			return;
		};
		let channels = pending.runner.start(self.cancel.child_token());
		self.handle = Some(tokio::spawn(forward(
			self.name.clone(),
			channels,
			pending.action,
			pending.renew_tx,
			pending.done_tx,
			self.cancel.clone(),
		)));
		info!(credential = %self.name, "started template renderer");
	}

	pub async fn join(&mut self) {
		if let Some(handle) = self.handle.take() {
			if let Err(err) = handle.await {
				warn!(credential = %self.name, error = %err, "template task failed");
			}
		}
	}
}

impl Renewer for TemplateRenewer {
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

impl Drop for TemplateRenewer {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

async fn forward(
	name: String,
	channels: RunnerChannels,
	action: Option<Arc<dyn PostRenewAction>>,
	renew_tx: mpsc::Sender<RenewOutput>,
	done_tx: mpsc::Sender<RenewError>,
	cancel: CancellationToken,
) {
	let RunnerChannels {
		mut events,
		mut errors,
	} = channels;
	let (mut events_open, mut errors_open) = (true, true);

	while events_open || errors_open {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			event = events.recv(), if events_open => {
				let Some(event) = event else {
					events_open = false;
					continue;
				};
				if let Some(action) = &action {
					if let Err(source) = action.execute().await {
						let _ = done_tx
							.send(RenewError::PostRenewAction {
								credential: name.clone(),
								source,
							})
							.await;
						continue;
					}
				}
				let output = RenewOutput::new(name.clone())
					.with_message("render completed")
					.at(event.rendered_at);
				let _ = renew_tx.send(output).await;
			}
			err = errors.recv(), if errors_open => {
				let Some(source) = err else {
					errors_open = false;
					continue;
				};
				warn!(credential = %name, error = %source, "template render failed");
				let _ = done_tx
					.send(RenewError::Render {
						credential: name.clone(),
						source,
					})
					.await;
			}
		}
	}

	debug!(credential = %name, "template forwarder stopped");
}
