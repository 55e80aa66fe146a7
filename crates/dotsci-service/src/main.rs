//! Main entry point for the dotsci command-line tool.
//!
//! Loads the TOML configuration, builds the publication pipeline from the
//! registered implementations, connects a signing agent when the command
//! needs one and runs the command. Ctrl-C during reconciliation stops the
//! poll; the command then reports the publication as pending.

use clap::Parser;
use dotsci_account::AgentKind;
use dotsci_config::Config;
use dotsci_service::{build_orchestrator_from_config, cli};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = cli::Cli::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	tracing::info!("Loading configuration from file: {:?}", args.config);
	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.app.name);

	let orchestrator = Arc::new(build_orchestrator_from_config(&config).await?);

	if args.command.needs_session() {
		let kind: AgentKind = args
			.agent
			.as_deref()
			.unwrap_or(&config.agents.default)
			.parse()?;
		let session = orchestrator.connect(kind).await?;
		tracing::info!(address = %session.address(), agent = %kind, "Connected");
	}

	let progress = tokio::spawn(cli::report_progress(orchestrator.subscribe()));

	let result = {
		let command = cli::run(args.command, &orchestrator);
		tokio::pin!(command);
		tokio::select! {
			result = &mut command => result,
			_ = tokio::signal::ctrl_c() => {
				tracing::warn!("Interrupted, stopping reconciliation");
				orchestrator.shutdown();
				command.await
			}
		}
	};

	// Dropping the orchestrator closes the event channel once the reporter has drained it.
	drop(orchestrator);
	let _ = progress.await;
	result
}
