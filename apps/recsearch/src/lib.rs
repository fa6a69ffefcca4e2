pub mod output;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use recsearch_service::{HttpTransport, PageDirection, PopulateOutcome, SourceRegistry};

use crate::output::JsonLinesOutput;

#[derive(Debug, Parser)]
#[command(
	version = recsearch_cli::VERSION,
	rename_all = "kebab",
	styles = recsearch_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Data source to populate.
	#[arg(long, value_name = "ID")]
	pub source: String,
	/// Further pages to fetch after the first one.
	#[arg(long, default_value_t = 0)]
	pub pages: u32,
	/// Send the request even when it matches the previous one.
	#[arg(long)]
	pub force: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = recsearch_config::load(&args.config)?;
	init_tracing(&config)?;
	let transport = Arc::new(HttpTransport::new(config.backend.clone()));
	let mut registry = SourceRegistry::from_config(&config, transport)?;

	registry.register_output(&args.source, "stdout", Arc::new(JsonLinesOutput::stdout()))?;

	let outcome = registry.populate(&args.source, args.force).await?;

	tracing::info!(source_id = %args.source, ?outcome, "First page loaded.");

	let source = registry.get_mut(&args.source)?;

	for _ in 0..args.pages {
		match source.turn_page(PageDirection::Forward).await? {
			Some(PopulateOutcome::PastLastPage) | None => {
				tracing::info!(source_id = %args.source, "No further pages.");

				break;
			},
			Some(outcome) => tracing::debug!(source_id = %args.source, ?outcome, "Page loaded."),
		}
	}

	Ok(())
}

fn init_tracing(config: &recsearch_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
	Ok(())
}
