// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Fan-in of many renewers' channels.

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::credential::RenewOutput;
use crate::error::RenewError;
use crate::renewer::{Renewer, CHANNEL_CAPACITY};

/// Merges the success and error channels of registered renewers.
///
/// Register every renewer with [`RenewerMerger::add_renewer`] before the
/// first call to [`RenewerMerger::renew_ch`], [`RenewerMerger::done_ch`] or
/// [`RenewerMerger::channels`]; the merged channels are built once and
/// later registrations are not forwarded. Each merged channel is fed by a
/// single task and closes after every source has closed. Events from one
/// source keep their order; there is no ordering across sources.
///
/// Building the merged channels spawns tasks and needs a Tokio runtime.
#[derive(Default)]
pub struct RenewerMerger {
	renew_sources: Vec<mpsc::Receiver<RenewOutput>>,
	done_sources: Vec<mpsc::Receiver<RenewError>>,
	renew_rx: Option<mpsc::Receiver<RenewOutput>>,
	done_rx: Option<mpsc::Receiver<RenewError>>,
}

impl RenewerMerger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Takes the renewer's channels.
	pub fn add_renewer(&mut self, renewer: &mut dyn Renewer) {
		if self.renew_rx.is_some() || self.done_rx.is_some() {
			warn!("renewer added after merged channels were built; it will not be forwarded");
		}
		match renewer.take_renew_rx() {
			Some(rx) => self.renew_sources.push(rx),
			None => warn!("renewer has no renew channel left to merge"),
		}
		match renewer.take_done_rx() {
			Some(rx) => self.done_sources.push(rx),
			None => warn!("renewer has no done channel left to merge"),
		}
	}

	pub fn len(&self) -> usize {
		self.renew_sources.len().max(self.done_sources.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The merged success channel.
	pub fn renew_ch(&mut self) -> &mut mpsc::Receiver<RenewOutput> {
		let sources = std::mem::take(&mut self.renew_sources);
		self.renew_rx.get_or_insert_with(|| merge(sources, "renew"))
	}

	/// The merged error channel.
	pub fn done_ch(&mut self) -> &mut mpsc::Receiver<RenewError> {
		let sources = std::mem::take(&mut self.done_sources);
		self.done_rx.get_or_insert_with(|| merge(sources, "done"))
	}

	/// Both merged channels at once, for use in a single `select!`.
	pub fn channels(
		&mut self,
	) -> (
		&mut mpsc::Receiver<RenewOutput>,
		&mut mpsc::Receiver<RenewError>,
	) {
		let renew_sources = std::mem::take(&mut self.renew_sources);
		let done_sources = std::mem::take(&mut self.done_sources);
		let renew = self
			.renew_rx
			.get_or_insert_with(|| merge(renew_sources, "renew"));
		let done = self
			.done_rx
			.get_or_insert_with(|| merge(done_sources, "done"));
		(renew, done)
	}
}

fn merge<T: Send + 'static>(sources: Vec<mpsc::Receiver<T>>, kind: &'static str) -> mpsc::Receiver<T> {
	let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
	let count = sources.len();
	let mut merged = stream::select_all(sources.into_iter().map(ReceiverStream::new));

	tokio::spawn(async move {
		while let Some(item) = merged.next().await {
			if tx.send(item).await.is_err() {
				debug!(kind, "merged channel receiver dropped");
				return;
			}
		}
		debug!(kind, sources = count, "all merged sources closed");
	});

	rx
}
