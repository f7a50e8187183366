//! Spreadsheet report over the sorted aggregate.
//!
//! One row per file, one column per named query, and a trailing total. LIVE reports link each
//! row and matched cell back to the search application. STATIC reports link each row to a
//! highlighted snapshot written next to the workbook. A hyperlink budget and an optional row
//! cap degrade the report silently instead of failing it.

mod links;
mod workbook;

use std::{
	collections::HashSet,
	io::ErrorKind,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
};

use tokio::fs;
use url::Url;

use self::workbook::PlannedRow;
use crate::{DocAddress, Error, HighlightRenderer, NamedQuery, Result, SearchIndex};
use rtag_storage::models::SortedRow;

pub const DEFAULT_MAX_HYPERLINKS: usize = 65_530;
pub const DEFAULT_SNAPSHOT_SUFFIX: &str = ".html";

const SNAPSHOT_DIR_SUFFIX: &str = "_files";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportMode {
	Live { base_url: Url },
	Static { suffix: String },
}

#[derive(Clone, Debug)]
pub struct ReportOptions {
	pub output: PathBuf,
	pub mode: ReportMode,
	/// `None` emits every file.
	pub top_n: Option<usize>,
	pub max_hyperlinks: usize,
}
impl ReportOptions {
	pub fn live(output: impl Into<PathBuf>, base_url: Url) -> Self {
		Self {
			output: output.into(),
			mode: ReportMode::Live { base_url },
			top_n: None,
			max_hyperlinks: DEFAULT_MAX_HYPERLINKS,
		}
	}

	pub fn snapshots(output: impl Into<PathBuf>) -> Self {
		Self {
			output: output.into(),
			mode: ReportMode::Static { suffix: DEFAULT_SNAPSHOT_SUFFIX.to_string() },
			top_n: None,
			max_hyperlinks: DEFAULT_MAX_HYPERLINKS,
		}
	}

	pub fn with_top_n(mut self, top_n: Option<usize>) -> Self {
		self.top_n = top_n;

		self
	}

	pub fn with_max_hyperlinks(mut self, max_hyperlinks: usize) -> Self {
		self.max_hyperlinks = max_hyperlinks;

		self
	}

	pub fn from_config(cfg: &rtag_config::Report) -> Result<Self> {
		let mode = match cfg.mode.as_str() {
			"live" => {
				let base_url = Url::parse(&cfg.live_base_url).map_err(|err| Error::InvalidRequest {
					message: format!("report.live_base_url is not a valid URL: {err}."),
				})?;

				ReportMode::Live { base_url }
			},
			"static" => ReportMode::Static { suffix: cfg.snapshot_suffix.clone() },
			other =>
				return Err(Error::InvalidRequest {
					message: format!("Unknown report mode {other:?}."),
				}),
		};

		Ok(Self {
			output: cfg.output.clone(),
			mode,
			top_n: cfg.top_n.map(|top_n| top_n as usize),
			max_hyperlinks: cfg.max_hyperlinks as usize,
		})
	}

	/// Sibling directory holding STATIC snapshots, `<report stem>_files`.
	pub fn snapshot_dir(&self) -> Option<PathBuf> {
		if !matches!(self.mode, ReportMode::Static { .. }) {
			return None;
		}

		let stem = self.output.file_stem()?.to_string_lossy();

		Some(self.output_dir().join(format!("{stem}{SNAPSHOT_DIR_SUFFIX}")))
	}

	fn output_dir(&self) -> &Path {
		match self.output.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportArtifact {
	pub report_path: PathBuf,
	pub snapshot_dir: Option<PathBuf>,
	pub rows_written: usize,
	pub hyperlinks_written: usize,
	pub snapshots_written: usize,
	/// True when the row cap left files out.
	pub truncated: bool,
}

/// Writes exactly one report. Create a new writer for every report.
pub struct ReportWriter {
	options: ReportOptions,
	index: Arc<dyn SearchIndex>,
	renderer: Option<Arc<dyn HighlightRenderer>>,
	used: AtomicBool,
}
impl ReportWriter {
	pub fn new(
		options: ReportOptions,
		index: Arc<dyn SearchIndex>,
		renderer: Option<Arc<dyn HighlightRenderer>>,
	) -> Result<Self> {
		if options.output.file_name().is_none() {
			return Err(Error::InvalidRequest {
				message: format!("Report output {:?} must name a file.", options.output),
			});
		}
		if matches!(options.mode, ReportMode::Static { .. }) && renderer.is_none() {
			return Err(Error::InvalidRequest {
				message: "Static reports require a highlight renderer.".to_string(),
			});
		}

		Ok(Self { options, index, renderer, used: AtomicBool::new(false) })
	}

	pub fn options(&self) -> &ReportOptions {
		&self.options
	}

	/// Writes `rows`, which must already be ordered by total descending then file id.
	///
	/// On failure the partially written workbook, and a snapshot directory this call created,
	/// are removed.
	pub async fn write(
		&self,
		queries: &[NamedQuery],
		rows: &[SortedRow],
	) -> Result<ReportArtifact> {
		if self.used.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyExecuted { operation: "ReportWriter::write" });
		}

		let snapshot_dir = self.options.snapshot_dir();
		let fresh_snapshot_dir = match &snapshot_dir {
			Some(dir) => !fs::try_exists(dir).await.unwrap_or(false),
			None => false,
		};

		match self.emit(queries, rows, snapshot_dir.as_deref()).await {
			Ok(artifact) => Ok(artifact),
			Err(err) => {
				tracing::warn!(
					output = %self.options.output.display(),
					error = %err,
					"Report write failed; removing partial output."
				);

				remove_partial_file(&self.options.output).await;

				if let Some(dir) = snapshot_dir.filter(|_| fresh_snapshot_dir) {
					remove_partial_dir(&dir).await;
				}

				Err(err)
			},
		}
	}

	async fn emit(
		&self,
		queries: &[NamedQuery],
		rows: &[SortedRow],
		snapshot_dir: Option<&Path>,
	) -> Result<ReportArtifact> {
		let emitted = &rows[..rows.len().min(self.options.top_n.unwrap_or(usize::MAX))];
		let truncated = emitted.len() < rows.len();
		let mut budget = LinkBudget::new(self.options.max_hyperlinks);
		let mut planned = Vec::with_capacity(emitted.len());
		let mut claimed = HashSet::new();
		let mut snapshots_written = 0;

		if truncated {
			tracing::info!(
				top_n = emitted.len(),
				files = rows.len(),
				"Report row cap reached; remaining files are omitted."
			);
		}
		if let Some(dir) = snapshot_dir {
			fs::create_dir_all(dir).await.map_err(|err| Error::Report {
				message: format!("Failed to create snapshot directory {}: {err}", dir.display()),
			})?;
		}

		for row in emitted {
			let mut plan = PlannedRow {
				file_id: row.file_id.clone(),
				display_name: row.display_name.clone(),
				relative_path: row.relative_path.clone(),
				total: row.total,
				weights: row.weights.iter().map(|(id, weight)| (*id, *weight)).collect(),
				file_link: None,
				cell_links: Vec::new(),
			};

			match (&self.options.mode, snapshot_dir) {
				(ReportMode::Live { base_url }, _) => {
					plan_live(base_url, queries, row, &mut plan, &mut budget);
				},
				(ReportMode::Static { suffix }, Some(dir)) => {
					let target = SnapshotTarget { dir, suffix, claimed: &mut claimed };
					let written =
						self.plan_snapshot(target, queries, row, &mut plan, &mut budget).await?;

					if written {
						snapshots_written += 1;
					}
				},
				(ReportMode::Static { .. }, None) => {},
			}

			planned.push(plan);
		}

		let rows_written = planned.len();
		let hyperlinks_written = budget.used;
		let output = self.options.output.clone();
		let queries = queries.to_vec();

		tokio::task::spawn_blocking(move || workbook::save(&output, &queries, &planned)).await??;

		tracing::info!(
			output = %self.options.output.display(),
			rows = rows_written,
			hyperlinks = hyperlinks_written,
			snapshots = snapshots_written,
			truncated,
			"Report written."
		);

		Ok(ReportArtifact {
			report_path: self.options.output.clone(),
			snapshot_dir: snapshot_dir.map(Path::to_path_buf),
			rows_written,
			hyperlinks_written,
			snapshots_written,
			truncated,
		})
	}

	/// Renders and links the row's snapshot. Returns whether a snapshot was written.
	async fn plan_snapshot(
		&self,
		target: SnapshotTarget<'_>,
		queries: &[NamedQuery],
		row: &SortedRow,
		plan: &mut PlannedRow,
		budget: &mut LinkBudget,
	) -> Result<bool> {
		let Some(address) = row.doc_address else {
			tracing::debug!(file_id = %row.file_id, "No display entry; skipping snapshot.");

			return Ok(false);
		};
		let Some(renderer) = &self.renderer else {
			return Ok(false);
		};
		let SnapshotTarget { dir, suffix, claimed } = target;
		let relative = unclaimed_path(claimed, row, suffix);
		let dir_name = dir.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
		let link = links::snapshot_link(&dir_name, &relative);

		if !fits(&link) {
			tracing::warn!(
				file_id = %row.file_id,
				"Snapshot link is too long; row is left unlinked."
			);

			return Ok(false);
		}
		if !budget.take() {
			return Ok(false);
		}

		claimed.insert(relative.clone());

		let matched = queries
			.iter()
			.filter(|query| row.weights.contains_key(&query.id))
			.cloned()
			.collect::<Vec<_>>();
		let fields = self.index.document(DocAddress(address)).await?;
		let html = renderer.render(&fields, &matched).await?;
		let path = dir.join(&relative);

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await.map_err(|err| Error::Report {
				message: format!("Failed to create snapshot directory {}: {err}", parent.display()),
			})?;
		}

		fs::write(&path, html).await.map_err(|err| Error::Report {
			message: format!("Failed to write snapshot {}: {err}", path.display()),
		})?;

		tracing::debug!(file_id = %row.file_id, path = %path.display(), "Snapshot written.");

		plan.file_link = Some(link);

		Ok(true)
	}
}

/// Where one report's snapshots go and which locations are already taken.
struct SnapshotTarget<'a> {
	dir: &'a Path,
	suffix: &'a str,
	claimed: &'a mut HashSet<PathBuf>,
}

/// Remaining navigable links for one report.
struct LinkBudget {
	remaining: usize,
	used: usize,
	exhausted: bool,
}
impl LinkBudget {
	fn new(max: usize) -> Self {
		Self { remaining: max, used: 0, exhausted: false }
	}

	fn take(&mut self) -> bool {
		if self.remaining == 0 {
			if !self.exhausted {
				self.exhausted = true;

				tracing::info!(
					max_hyperlinks = self.used,
					"Hyperlink cap reached; remaining cells keep values without links."
				);
			}

			return false;
		}

		self.remaining -= 1;
		self.used += 1;

		true
	}
}

fn plan_live(
	base_url: &Url,
	queries: &[NamedQuery],
	row: &SortedRow,
	plan: &mut PlannedRow,
	budget: &mut LinkBudget,
) {
	let matched = row.matched_query_ids();
	let file_url = links::live_url(base_url, &row.file_id, &matched);

	if fits(&file_url) && budget.take() {
		plan.file_link = Some(file_url);
	}

	for query in queries.iter().filter(|query| row.weights.contains_key(&query.id)) {
		let cell_url = links::live_url(base_url, &row.file_id, &[query.id]);

		if fits(&cell_url) && budget.take() {
			plan.cell_links.push((query.id, cell_url));
		}
	}
}

/// First snapshot location no earlier row has claimed. Clashes are tagged with the file id, then
/// with a counter.
fn unclaimed_path(claimed: &HashSet<PathBuf>, row: &SortedRow, suffix: &str) -> PathBuf {
	let relative = links::snapshot_relative_path(&row.relative_path, &row.file_id, suffix, None);

	if !claimed.contains(&relative) {
		return relative;
	}

	let mut tag = row.file_id.clone();
	let mut attempt = 1;

	loop {
		let relative =
			links::snapshot_relative_path(&row.relative_path, &row.file_id, suffix, Some(&tag));

		if !claimed.contains(&relative) {
			return relative;
		}

		attempt += 1;
		tag = format!("{}-{attempt}", row.file_id);
	}
}

fn fits(link: &str) -> bool {
	link.chars().count() <= links::MAX_URL_CHARS
}

async fn remove_partial_file(path: &Path) {
	match fs::remove_file(path).await {
		Ok(()) => {},
		Err(err) if err.kind() == ErrorKind::NotFound => {},
		Err(err) => {
			tracing::warn!(
				path = %path.display(),
				error = %err,
				"Failed to remove partial report."
			);
		},
	}
}

async fn remove_partial_dir(path: &Path) {
	match fs::remove_dir_all(path).await {
		Ok(()) => {},
		Err(err) if err.kind() == ErrorKind::NotFound => {},
		Err(err) => {
			tracing::warn!(
				path = %path.display(),
				error = %err,
				"Failed to remove partial snapshot directory."
			);
		},
	}
}
