// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use anyhow::Context;
use clap::{Parser, Subcommand};
use credmanager_common_core::TokenRequest;
use credmanager_common_secret::SecretString;
use credmanager_credentials::{load_credential_configs, CredmanagerClient, VaultSelfToken};
use credmanager_daemon::{
	Admission, DaemonConfig, Ec2Login, LogFormat, Supervisor, TokenChain, DEFAULT_CONFIG_PATH,
};
use credmanager_vault::{Ec2Metadata, VaultApi, VaultClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "credmanager", about = "Keeps this node's Vault-issued credentials renewed")]
struct Args {
	#[arg(long, short, env = "CREDMANAGER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
	config: PathBuf,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Obtain a token and renew credentials until stopped (default).
	Run,
	/// Print version information.
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	match args.command.unwrap_or(Command::Run) {
		Command::Version => {
			println!("{}", credmanager_daemon::version::format_version_info());
			Ok(())
		}
		Command::Run => run(args.config).await,
	}
}

fn init_tracing(config: &DaemonConfig) {
	let json = config.logging.format == LogFormat::Json;
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.with((!json).then(tracing_subscriber::fmt::layer))
		.init();
}

async fn run(config_path: PathBuf) -> anyhow::Result<()> {
	let config = DaemonConfig::load(&config_path).context("failed to load configuration")?;
	init_tracing(&config);
	tracing::info!(
		hostname = %config.hostname,
		vault = %config.vault.address,
		version = credmanager_daemon::version::VERSION,
		"starting credmanager"
	);

	let credentials = load_credential_configs(&config.credential_config_dir)
		.context("failed to load credential declarations")?;
	tracing::info!(count = credentials.len(), "loaded credential declarations");

	let http = credmanager_common_http::new_client().context("failed to build HTTP client")?;
	let client = Arc::new(
		VaultClient::with_http_client(
			vault_http(&config)?,
			&config.vault.address,
			SecretString::from(""),
		)
		.context("invalid Vault address")?,
	);

	let health = client
		.health()
		.await
		.with_context(|| format!("Vault at {} is not healthy", config.vault.address))?;
	tracing::info!(version = %health.version, standby = health.standby, "Vault is reachable");

	let admission = config
		.admission
		.as_ref()
		.map(|section| -> anyhow::Result<Admission> {
			Ok(Admission {
				client: CredmanagerClient::new(
					http.clone(),
					&section.server_url,
					&section.token_file,
				)?,
				request: TokenRequest {
					hostname: config.hostname.clone(),
					policies: section.policies.clone(),
				},
			})
		})
		.transpose()
		.context("invalid admission configuration")?;

	let ec2_login = config
		.vault
		.ec2_login
		.as_ref()
		.map(|section| -> anyhow::Result<Ec2Login> {
			Ok(Ec2Login {
				metadata: Ec2Metadata::new(http.clone(), &section.metadata_url)?,
				role: section.role.clone(),
				nonce: section.nonce.clone(),
			})
		})
		.transpose()
		.context("invalid EC2 login configuration")?;

	let chain = TokenChain::from_env(config.vault.token_file.clone(), admission)
		.with_ec2_login(ec2_login);
	let (token, origin) = chain
		.resolve(client.as_ref())
		.await
		.context("failed to obtain a Vault token")?;
	client.set_token(token);

	let vault: Arc<dyn VaultApi> = client;
	let own_token = VaultSelfToken::discover(vault.clone())
		.await
		.with_context(|| format!("Vault rejected the token from {origin}"))?;

	let mut supervisor = Supervisor::from_configs(credentials, vault.clone()).await?;
	supervisor.add_credential(own_token, None);
	supervisor.start();

	let outcome = supervisor.run(shutdown_signal()).await;
	supervisor.shutdown(config.shutdown.grace_period()).await;
	outcome?;

	tracing::info!("credmanager stopped");
	Ok(())
}

/// HTTP client for Vault, presenting the configured client certificate.
fn vault_http(config: &DaemonConfig) -> anyhow::Result<reqwest::Client> {
	let mut builder =
		credmanager_common_http::builder().timeout(credmanager_common_http::DEFAULT_TIMEOUT);
	if let (Some(cert), Some(key)) = (&config.vault.client_cert, &config.vault.client_key) {
		let identity = credmanager_common_http::identity_from_pem_files(cert, key)
			.context("failed to load Vault client certificate")?;
		builder = builder.identity(identity);
		tracing::info!(cert = %cert.display(), "presenting client certificate to Vault");
	}
	builder.build().context("failed to build Vault HTTP client")
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %err, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				tracing::error!(error = %err, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("received SIGINT, exiting"),
		_ = terminate => tracing::info!("received SIGTERM, exiting"),
	}
}
