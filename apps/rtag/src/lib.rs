use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtag_providers::{corpus::CorpusIndex, highlight::HtmlHighlighter};
use rtag_service::{
	HighlightRenderer, NamedQuery, ReportMode, ReportOptions, ReportWriter, RunOptions,
	RunSummary, SearchIndex, TaggingRun,
};

#[derive(Debug, Parser)]
#[command(
	version = rtag_cli::VERSION,
	rename_all = "kebab",
	styles = rtag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Query set file of `[[query]]` tables.
	#[arg(long, short = 'q', value_name = "FILE")]
	pub queries: PathBuf,
	/// JSON Lines corpus, one document per line.
	#[arg(long, value_name = "FILE")]
	pub corpus: PathBuf,
	/// Overrides `report.output`.
	#[arg(long, short = 'o', value_name = "FILE")]
	pub output: Option<PathBuf>,
	/// Overrides `report.mode`.
	#[arg(long, value_parser = ["live", "static"])]
	pub mode: Option<String>,
	/// Overrides `report.top_n`. Zero means unlimited.
	#[arg(long, value_name = "ROWS")]
	pub top_n: Option<u32>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let mut config = rtag_config::load(&args.config)?;

	apply_overrides(&mut config, &args);
	init_tracing(&config);

	let queries = rtag_config::load_queries(&args.queries)?
		.into_iter()
		.map(NamedQuery::from)
		.collect::<Vec<_>>();
	let index: Arc<dyn SearchIndex> = Arc::new(CorpusIndex::load(&args.corpus)?);
	let report_options = ReportOptions::from_config(&config.report)?;
	let renderer: Option<Arc<dyn HighlightRenderer>> = match report_options.mode {
		ReportMode::Static { .. } => Some(Arc::new(HtmlHighlighter::new())),
		ReportMode::Live { .. } => None,
	};
	let writer = ReportWriter::new(report_options, Arc::clone(&index), renderer)?;
	let run = TaggingRun::new(queries, index, RunOptions::from_config(&config)?, writer)?;
	let mut status = run.status();
	let watcher = tokio::spawn(async move {
		while let Some(phase) = status.changed().await {
			tracing::info!(status = %phase, "Run status.");

			if phase.is_terminal() {
				break;
			}
		}
	});
	let result = run.execute().await;

	drop(run);

	if let Err(err) = watcher.await {
		tracing::warn!(error = %err, "Status watcher stopped unexpectedly.");
	}

	report_summary(&result?);

	Ok(())
}

fn apply_overrides(config: &mut rtag_config::Config, args: &Args) {
	if let Some(output) = &args.output {
		config.report.output = output.clone();
	}
	if let Some(mode) = &args.mode {
		config.report.mode = mode.clone();
	}
	if let Some(top_n) = args.top_n {
		config.report.top_n = (top_n > 0).then_some(top_n);
	}
}

fn report_summary(summary: &RunSummary) {
	let artifact = &summary.artifact;

	tracing::info!(
		report = %artifact.report_path.display(),
		files_scored = summary.files_scored,
		rows = artifact.rows_written,
		hyperlinks = artifact.hyperlinks_written,
		snapshots = artifact.snapshots_written,
		truncated = artifact.truncated,
		estimate_complete = summary.estimate == rtag_service::EstimateOutcome::Complete,
		"Report ready."
	);
}

fn init_tracing(config: &rtag_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}
