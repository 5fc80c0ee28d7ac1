// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Renewer and merger behaviour under a paused clock.

use async_trait::async_trait;
use credmanager_renewal::{
	BoxError, CredentialRenewer, PostRenewAction, RenewError, RenewableCredential, Renewer,
	RenewerConfig, RenewerMerger,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

struct FakeCredential {
	name: String,
	window: Duration,
	fail: bool,
	calls: Arc<AtomicUsize>,
}

impl FakeCredential {
	fn new(name: &str, window: Duration, fail: bool) -> (Self, Arc<AtomicUsize>) {
		let calls = Arc::new(AtomicUsize::new(0));
		(
			Self {
				name: name.to_string(),
				window,
				fail,
				calls: calls.clone(),
			},
			calls,
		)
	}
}

impl fmt::Display for FakeCredential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

#[async_trait]
impl RenewableCredential for FakeCredential {
	async fn renew(&mut self) -> Result<(), BoxError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.fail {
			Err(format!("{} backend unreachable", self.name).into())
		} else {
			Ok(())
		}
	}

	fn max_renew_interval(&self) -> Duration {
		self.window
	}
}

#[derive(Debug)]
struct FailingAction;

#[async_trait]
impl PostRenewAction for FailingAction {
	async fn execute(&self) -> Result<(), BoxError> {
		Err("unit not found".into())
	}
}

#[derive(Debug, Default)]
struct CountingAction(AtomicUsize);

#[async_trait]
impl PostRenewAction for CountingAction {
	async fn execute(&self) -> Result<(), BoxError> {
		self.0.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Purpose: a credential that always renews reports one output per cycle
/// and nothing on the error channel.
#[tokio::test(start_paused = true)]
async fn always_succeeding_credential_reports_each_cycle() {
	let (cred, calls) = FakeCredential::new("pki", Duration::from_secs(600), false);
	let action = Arc::new(CountingAction::default());
	let mut renewer = CredentialRenewer::new(cred, Some(action.clone() as Arc<dyn PostRenewAction>));
	let mut renew_rx = renewer.take_renew_rx().unwrap();
	let mut done_rx = renewer.take_done_rx().unwrap();
	renewer.renew();

	let start = tokio::time::Instant::now();
	for _ in 0..3 {
		let output = renew_rx.recv().await.unwrap();
		assert_eq!(output.source, "pki");
		assert!(output.message.is_none());
	}
	// first renewal immediately, then two half-window intervals (±10%)
	let elapsed = start.elapsed();
	assert!(elapsed >= Duration::from_secs(540), "{elapsed:?}");
	assert!(elapsed <= Duration::from_secs(660), "{elapsed:?}");

	renewer.stop();
	renewer.join().await;

	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert_eq!(action.0.load(Ordering::SeqCst), 3);
	assert!(matches!(done_rx.try_recv(), Err(TryRecvError::Disconnected)));
}

/// Purpose: a credential that never renews only produces errors, and
/// exactly one terminal max-retries error once failures exceed the limit.
#[tokio::test(start_paused = true)]
async fn always_failing_credential_reports_max_retries_once() {
	let (cred, calls) = FakeCredential::new("ssh", Duration::from_secs(3600), true);
	let config = RenewerConfig {
		max_failures: 3,
		..RenewerConfig::default()
	};
	let mut renewer = CredentialRenewer::with_config(cred, None, config);
	let mut renew_rx = renewer.take_renew_rx().unwrap();
	let mut done_rx = renewer.take_done_rx().unwrap();
	renewer.renew();

	let mut errors = Vec::new();
	while errors.len() < 8 {
		errors.push(done_rx.recv().await.unwrap());
	}
	renewer.stop();
	renewer.join().await;
	while let Ok(err) = done_rx.try_recv() {
		errors.push(err);
	}

	let terminal: Vec<usize> = errors
		.iter()
		.enumerate()
		.filter(|(_, e)| e.is_terminal())
		.map(|(i, _)| i)
		.collect();
	assert_eq!(terminal.len(), 1);
	// four renew failures precede the terminal error
	assert_eq!(terminal[0], 4);
	assert!(errors
		.iter()
		.filter(|e| !e.is_terminal())
		.all(|e| matches!(e, RenewError::Renew { .. })));
	assert!(calls.load(Ordering::SeqCst) >= 7);
	assert!(matches!(renew_rx.try_recv(), Err(TryRecvError::Disconnected)));
}

/// Purpose: a failed reload after a good renewal counts as a failure so the
/// stale consumer is not silently ignored.
#[tokio::test(start_paused = true)]
async fn failing_post_renew_action_is_reported() {
	let (cred, _) = FakeCredential::new("token", Duration::from_secs(60), false);
	let mut renewer = CredentialRenewer::new(cred, Some(Arc::new(FailingAction)));
	let mut renew_rx = renewer.take_renew_rx().unwrap();
	let mut done_rx = renewer.take_done_rx().unwrap();
	renewer.renew();

	let err = done_rx.recv().await.unwrap();
	assert!(matches!(err, RenewError::PostRenewAction { .. }));
	assert!(err.to_string().contains("unit not found"));
	assert!(matches!(renew_rx.try_recv(), Err(TryRecvError::Empty)));

	renewer.stop();
	renewer.join().await;
}

/// Purpose: stop is observed while the loop waits on a long timer.
#[tokio::test(start_paused = true)]
async fn stop_interrupts_long_wait() {
	let (cred, calls) = FakeCredential::new("long", Duration::from_secs(30 * 24 * 3600), false);
	let mut renewer = CredentialRenewer::new(cred, None);
	let mut renew_rx = renewer.take_renew_rx().unwrap();
	renewer.renew();
	renew_rx.recv().await.unwrap();

	let before = tokio::time::Instant::now();
	renewer.stop();
	renewer.join().await;
	assert!(before.elapsed() < Duration::from_secs(1));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(renew_rx.recv().await.is_none());
}

/// Purpose: every event from many concurrently firing renewers arrives on
/// the merged channels exactly once.
#[tokio::test(start_paused = true)]
async fn merger_delivers_every_event_once() {
	let mut merger = RenewerMerger::new();
	let mut renewers = Vec::new();
	let mut calls = HashMap::new();
	for i in 0..8 {
		let fail = i % 2 == 1;
		let name = format!("cred-{i}");
		let (cred, counter) = FakeCredential::new(&name, Duration::from_secs(10 + i), fail);
		calls.insert(name, counter);
		let mut renewer = CredentialRenewer::new(cred, None);
		merger.add_renewer(&mut renewer);
		renewers.push(renewer);
	}
	for renewer in &mut renewers {
		renewer.renew();
	}

	let mut outputs: HashMap<String, usize> = HashMap::new();
	let mut errors: HashMap<String, usize> = HashMap::new();
	let (renew, done) = merger.channels();
	while outputs.values().sum::<usize>() < 20 || errors.values().sum::<usize>() < 20 {
		tokio::select! {
			Some(output) = renew.recv() => *outputs.entry(output.source).or_default() += 1,
			Some(err) = done.recv() => *errors.entry(err.credential().to_string()).or_default() += 1,
		}
	}

	for renewer in &renewers {
		renewer.stop();
	}
	for renewer in &mut renewers {
		renewer.join().await;
	}
	while let Some(output) = renew.recv().await {
		*outputs.entry(output.source).or_default() += 1;
	}
	while let Some(err) = done.recv().await {
		*errors.entry(err.credential().to_string()).or_default() += 1;
	}

	assert_eq!(outputs.len(), 4);
	assert_eq!(errors.len(), 4);
	for (name, counter) in &calls {
		let renewals = counter.load(Ordering::SeqCst);
		if let Some(received) = outputs.get(name) {
			assert_eq!(*received, renewals, "{name}");
			assert!(!errors.contains_key(name));
		} else {
			// one error per failed attempt plus the single max-retries error
			let expected = renewals + usize::from(renewals > 18);
			assert_eq!(errors.get(name).copied(), Some(expected), "{name}");
		}
	}
}
