use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oracle_config::ConfigLoader;
use oracle_core::OracleBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "oracle")]
#[command(about = "Bridge oracle: observes chains and submits claims to the bridge", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/oracle.toml")]
	config: PathBuf,

	#[arg(long, env = "ORACLE_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the oracle
	Start,
	/// Validate the configuration file
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	match cli.command {
		Some(Commands::Start) | None => start_service(cli).await,
		Some(Commands::Validate) => validate_config(cli),
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	let config = ConfigLoader::from_file(&cli.config).context("Failed to load configuration")?;

	info!(
		name = %config.oracle.name,
		cardano_chains = config.cardano_chains.len(),
		eth_chains = config.eth_chains.len(),
		"Configuration loaded"
	);

	let api_config = config.api.clone();
	let oracle = OracleBuilder::new()
		.with_config(config)
		.build()
		.await
		.context("Failed to build oracle")?;
	let oracle = Arc::new(oracle);

	oracle.start().await.context("Failed to start oracle")?;

	let http_handle = if api_config.enabled {
		let oracle = oracle.clone();
		Some(tokio::spawn(async move {
			if let Err(e) = api::start_http_server(oracle, &api_config.host, api_config.port).await {
				error!(error = %e, "HTTP server stopped");
			}
		}))
	} else {
		info!("HTTP API disabled");
		None
	};

	info!("Oracle service started");

	setup_shutdown_signal().await;
	info!("Shutdown signal received, stopping oracle...");

	oracle.shutdown().await.context("Failed to shutdown oracle")?;

	if let Some(handle) = http_handle {
		handle.abort();
	}

	info!("Oracle service stopped");
	Ok(())
}

fn validate_config(cli: Cli) -> Result<()> {
	let config = ConfigLoader::from_file(&cli.config).context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Oracle name: {}", config.oracle.name);
	for (chain_id, chain) in &config.cardano_chains {
		info!("  Cardano chain: {} (bridging address {})", chain_id, chain.bridging_address);
	}
	for (chain_id, chain) in &config.eth_chains {
		info!("  EVM chain: {} (gateway {})", chain_id, chain.bridging_address);
	}

	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
		.with_context(|| format!("Invalid log level: {}", log_level))?;

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()
		.context("Failed to install tracing subscriber")?;

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!(error = %e, "Failed to listen for Ctrl+C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!(error = %e, "Failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
