//! Command-line interface of the `dotsci` binary.

use alloy_primitives::{hex, keccak256};
use clap::{Parser, Subcommand};
use dotsci_core::{PublicationOrchestrator, RequireConfirmed};
use dotsci_types::{with_0x_prefix, Asset, PublicationEvent, ReconciliationOutcome};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "dotsci")]
#[command(about = "Publish research assets to decentralized storage and register them on-chain")]
#[command(version)]
pub struct Cli {
	/// Path to the configuration file
	#[arg(short, long, env = "DOTSCI_CONFIG", default_value = "config/dotsci.toml")]
	pub config: PathBuf,

	/// Signing agent kind to connect (metamask, trust, phantom, bitget)
	///
	/// Defaults to `agents.default` from the configuration.
	#[arg(short, long)]
	pub agent: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	pub log_level: String,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Upload a file and register it as a paper
	Publish {
		/// File to publish
		file: PathBuf,

		/// Paper title
		#[arg(short, long)]
		title: String,

		#[arg(short, long, default_value = "")]
		description: String,

		/// Content-integrity hash; defaults to the keccak-256 of the file
		#[arg(long)]
		hash: Option<String>,

		/// Access price in native coin, e.g. "0.01"
		#[arg(long, default_value = "0")]
		price: String,

		/// MIME type; guessed from the file extension when omitted
		#[arg(long)]
		content_type: Option<String>,

		/// Open a DAO for the paper
		#[arg(long)]
		create_dao: bool,

		/// Exit with an error if the record is not visible before the deadline
		#[arg(long)]
		require_confirmed: bool,
	},

	/// List published papers, newest first
	Explore,

	/// List grant proposals
	Proposals,

	/// Open a grant proposal
	Propose {
		description: String,

		/// Requested amount in native coin
		amount: String,
	},

	/// Vote on a grant proposal, paying the configured voting fee
	Vote {
		proposal_id: u64,

		/// Vote against instead of for
		#[arg(long)]
		against: bool,
	},
}

impl Commands {
	/// Whether the command signs anything.
	pub fn needs_session(&self) -> bool {
		matches!(
			self,
			Commands::Publish { .. } | Commands::Propose { .. } | Commands::Vote { .. }
		)
	}
}

/// MIME type for a file name, by extension.
pub fn guess_content_type(path: &Path) -> &'static str {
	let extension = path
		.extension()
		.and_then(|e| e.to_str())
		.map(|e| e.to_ascii_lowercase());
	match extension.as_deref() {
		Some("pdf") => "application/pdf",
		Some("json") => "application/json",
		Some("txt") | Some("md") => "text/plain",
		Some("csv") => "text/csv",
		Some("png") => "image/png",
		Some("jpg") | Some("jpeg") => "image/jpeg",
		Some("zip") => "application/zip",
		_ => "application/octet-stream",
	}
}

/// Reads `file` and turns the publish arguments into an [`Asset`].
#[allow(clippy::too_many_arguments)]
pub async fn load_asset(
	file: &Path,
	title: String,
	description: String,
	hash: Option<String>,
	price: String,
	content_type: Option<String>,
	create_dao: bool,
) -> Result<Asset, Box<dyn std::error::Error>> {
	let payload = tokio::fs::read(file)
		.await
		.map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
	let file_name = file
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| format!("Invalid file name: {}", file.display()))?
		.to_string();
	let output_hash =
		hash.unwrap_or_else(|| with_0x_prefix(&hex::encode(keccak256(&payload))));

	Ok(Asset {
		title,
		description,
		content_type: content_type.unwrap_or_else(|| guess_content_type(file).to_string()),
		file_name,
		payload,
		output_hash,
		price,
		create_dao,
	})
}

/// Prints progress events until the channel closes.
pub async fn report_progress(mut events: broadcast::Receiver<PublicationEvent>) {
	loop {
		match events.recv().await {
			Ok(event) => println!(
				"#{} [{}] {}",
				event.publication_id, event.stage, event.message
			),
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				tracing::warn!(skipped, "Progress reporter fell behind");
			},
			Err(broadcast::error::RecvError::Closed) => break,
		}
	}
}

fn describe(outcome: &ReconciliationOutcome) -> String {
	match outcome {
		ReconciliationOutcome::Confirmed { record_id } => format!("confirmed as #{}", record_id),
		ReconciliationOutcome::TimedOut { attempts } => format!(
			"pending: not visible after {} checks, the transaction is final; check again later",
			attempts
		),
		ReconciliationOutcome::Cancelled => {
			"pending: reconciliation stopped, the transaction is final".to_string()
		},
	}
}

/// Runs one command against a built orchestrator.
pub async fn run(
	command: Commands,
	orchestrator: &PublicationOrchestrator,
) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Commands::Publish {
			file,
			title,
			description,
			hash,
			price,
			content_type,
			create_dao,
			require_confirmed,
		} => {
			let asset =
				load_asset(&file, title, description, hash, price, content_type, create_dao)
					.await?;
			let result = orchestrator.publish(asset).await?;

			println!("content:  {}", result.content.view_url);
			println!("metadata: {}", result.metadata_object.uri());
			println!("tx:       {}", result.receipt.hash);
			if result.hash_truncated {
				println!("note:     content hash was truncated to fit the ledger field");
			}
			println!("status:   {}", describe(&result.reconciliation));

			if require_confirmed {
				result.require_confirmed()?;
			}
		},
		Commands::Explore => {
			let records = orchestrator.explore().await?;
			if records.is_empty() {
				println!("No papers published yet");
			}
			for record in records {
				println!("{}", serde_json::to_string(&record)?);
			}
		},
		Commands::Proposals => {
			let proposals = orchestrator.proposals().await?;
			if proposals.is_empty() {
				println!("No grant proposals yet");
			}
			for proposal in proposals {
				println!(
					"#{} [{}] {} requested {} (for {}, against {}) by {}",
					proposal.id,
					proposal.status,
					proposal.description,
					orchestrator.ledger().format_amount(proposal.requested_amount),
					proposal.for_votes,
					proposal.against_votes,
					proposal.proposer
				);
			}
		},
		Commands::Propose {
			description,
			amount,
		} => {
			let submission = orchestrator.propose_grant(&description, &amount).await?;
			println!("tx:     {}", submission.receipt.hash);
			println!("status: {}", describe(&submission.reconciliation));
		},
		Commands::Vote {
			proposal_id,
			against,
		} => {
			let receipt = orchestrator.vote(proposal_id, !against).await?;
			println!("tx: {} (block {})", receipt.hash, receipt.block_number);
		},
	}
	Ok(())
}
