// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use anyhow::Context;
use clap::{Parser, Subcommand};
use credmanager_server::{
	create_router, AdmissionGates, AppState, ConsulCatalog, IssuerConfig, PolicyTemplate,
	ServiceCatalog, StaticInventory, TokenIssuer,
};
use credmanager_server_activation::NodeActivationStore;
use credmanager_server_config::{LogFormat, ServerConfig};
use credmanager_vault::{Kv, KvVersion, VaultApi, VaultClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "credmanager-server", about = "Vault token admission server")]
struct Args {
	/// Configuration file. Defaults to /etc/credmanager/server.toml.
	#[arg(long, short, env = "CREDMANAGER_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the admission server (default).
	Serve,
	/// Open an activation window for a node.
	Activate {
		node_id: String,
		/// Window length, e.g. "30m".
		#[arg(long, value_parser = humantime::parse_duration)]
		ttl: Duration,
		/// Keep the window open after a successful admission.
		#[arg(long)]
		replayable: bool,
	},
	/// Show a node's activation record.
	Status { node_id: String },
	/// Print version information.
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let command = args.command.unwrap_or(Command::Serve);
	if let Command::Version = command {
		println!("{}", credmanager_server::version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => credmanager_server_config::load_config_with_file(path),
		None => credmanager_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config);

	let vault = vault_client(&config)?;
	let kv_version = KvVersion::from_number(config.vault.kv_version)
		.context("unsupported kv_version")?;
	let activation = Arc::new(NodeActivationStore::new(
		Kv::new(vault.clone(), config.vault.kv_mount.clone(), kv_version),
		config.activation.base_path.clone(),
	));

	match command {
		Command::Activate {
			node_id,
			ttl,
			replayable,
		} => {
			if replayable {
				activation.activate_replayable(&node_id, ttl).await?;
			} else {
				activation.activate(&node_id, ttl).await?;
			}
			println!("{}", activation.status(&node_id).await?);
			Ok(())
		}
		Command::Status { node_id } => {
			println!("{}", activation.status(&node_id).await?);
			Ok(())
		}
		Command::Serve | Command::Version => serve(config, vault, activation).await,
	}
}

fn init_tracing(config: &ServerConfig) {
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

fn vault_client(config: &ServerConfig) -> anyhow::Result<Arc<dyn VaultApi>> {
	let token = config
		.vault
		.token
		.clone()
		.context("a Vault token is required")?;
	let http = credmanager_common_http::new_client().context("failed to build HTTP client")?;
	let client = VaultClient::with_http_client(http, &config.vault.address, token)
		.context("invalid Vault address")?;
	Ok(Arc::new(client))
}

async fn serve(
	config: ServerConfig,
	vault: Arc<dyn VaultApi>,
	activation: Arc<NodeActivationStore>,
) -> anyhow::Result<()> {
	let inventory = StaticInventory::load(&config.inventory.path)?;

	let template = match &config.vault.policy_template_file {
		Some(path) => PolicyTemplate::load(path)?,
		None => PolicyTemplate::default(),
	};
	let issuer = TokenIssuer::new(
		vault.clone(),
		template,
		IssuerConfig {
			token_role: config.vault.token_role.clone(),
			wrap_ttl: config.vault.wrap_ttl(),
			policy_prefix: config.vault.policy_prefix.clone(),
			role_prefix: config.vault.role_prefix.clone(),
		},
	);

	let catalog = match &config.admission.catalog_address {
		Some(address) => {
			let http =
				credmanager_common_http::new_client().context("failed to build HTTP client")?;
			Some(Arc::new(ConsulCatalog::new(http, address)?) as Arc<dyn ServiceCatalog>)
		}
		None => None,
	};

	let state = AppState {
		vault,
		inventory: Arc::new(inventory),
		catalog,
		activation,
		issuer: Arc::new(issuer),
		gates: AdmissionGates {
			verify_source_ip: config.admission.verify_source_ip,
			reject_registered_nodes: config.admission.reject_registered_nodes,
		},
	};
	let app = create_router(state);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!(%addr, version = credmanager_server::version::VERSION, "listening");

	let cancel = CancellationToken::new();
	let stop = cancel.clone();
	let server = axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(async move { stop.cancelled().await });
	let mut handle = tokio::spawn(async move { server.await });

	tokio::select! {
		result = &mut handle => {
			result??;
			return Ok(());
		}
		_ = shutdown_signal() => {}
	}

	cancel.cancel();
	let grace = config.shutdown.grace_period();
	match tokio::time::timeout(grace, handle).await {
		Ok(result) => result??,
		Err(_) => tracing::warn!(?grace, "in-flight requests did not drain before the grace period"),
	}

	tracing::info!("server shutdown complete");
	Ok(())
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
		_ = ctrl_c => tracing::info!("received SIGINT"),
		_ = terminate => tracing::info!("received SIGTERM"),
	}
}
