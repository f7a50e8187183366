//! Single-use orchestration of one tagging run.
//!
//! Each query runs as its own task, bounded by a semaphore. Workers never touch the scratch
//! store: they send one [`ScoreBatch`] per query to the driver, which is the store's only
//! writer. The first worker failure aborts the rest and fails the run. Scratch storage is
//! removed on every exit path.

use std::{
	collections::{BTreeMap, HashSet},
	path::PathBuf,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use tokio::{
	sync::{Semaphore, mpsc},
	task::JoinSet,
	time::{self, MissedTickBehavior},
};

use crate::{
	Error, NamedQuery, NormalizationPolicy, QueryId, ReportArtifact, ReportWriter, Result,
	SearchIndex,
	estimator::{self, Estimate, EstimateOutcome},
	status::{RunPhase, StatusHandle, StatusPublisher},
};
use rtag_storage::{
	ScratchBackend, ScratchDir, ScratchStore,
	models::{DisplayEntry, QueryRecord, ScoreBatch, ScoreRow, SortedRow},
	open_store,
};

pub const MAX_FILE_ID_CHARS: usize = 512;
pub const MAX_DISPLAY_NAME_CHARS: usize = 256;
pub const MAX_RELATIVE_PATH_CHARS: usize = 1_024;

#[derive(Clone, Debug)]
pub struct RunOptions {
	pub estimator_threads: usize,
	pub estimator_budget: Duration,
	pub max_workers: usize,
	/// Retrieval cap for unlimited queries.
	pub hard_hit_ceiling: u32,
	pub normalization: NormalizationPolicy,
	pub scratch_backend: ScratchBackend,
	pub scratch_root: Option<PathBuf>,
	pub status_log_interval: Duration,
}
impl RunOptions {
	pub fn from_config(cfg: &rtag_config::Config) -> Result<Self> {
		let scratch_backend = ScratchBackend::parse(&cfg.aggregator.scratch_backend)
			.map_err(|err| Error::InvalidRequest { message: err.to_string() })?;

		Ok(Self {
			estimator_threads: cfg.estimator.max_threads as usize,
			estimator_budget: Duration::from_secs(cfg.estimator.max_seconds),
			max_workers: cfg.aggregator.max_workers as usize,
			hard_hit_ceiling: cfg.aggregator.hard_hit_ceiling,
			normalization: NormalizationPolicy::parse(&cfg.aggregator.normalization)?,
			scratch_backend,
			scratch_root: cfg.aggregator.scratch_root.clone(),
			status_log_interval: Duration::from_millis(cfg.aggregator.status_log_interval_ms),
		})
	}
}

impl Default for RunOptions {
	fn default() -> Self {
		Self {
			estimator_threads: 4,
			estimator_budget: Duration::from_secs(30),
			max_workers: 10,
			hard_hit_ceiling: 100_000,
			normalization: NormalizationPolicy::WeightedInverseRank,
			scratch_backend: ScratchBackend::Sqlite,
			scratch_root: None,
			status_log_interval: Duration::from_secs(2),
		}
	}
}

#[derive(Clone, Debug)]
pub struct RunSummary {
	pub estimate: EstimateOutcome,
	pub files_scored: u64,
	/// Aggregate rows in report order.
	pub rows: Vec<SortedRow>,
	pub artifact: ReportArtifact,
}

pub struct TaggingRun {
	queries: Vec<NamedQuery>,
	index: Arc<dyn SearchIndex>,
	options: RunOptions,
	report: ReportWriter,
	status: StatusPublisher,
	executed: AtomicBool,
}
impl TaggingRun {
	pub fn new(
		queries: Vec<NamedQuery>,
		index: Arc<dyn SearchIndex>,
		options: RunOptions,
		report: ReportWriter,
	) -> Result<Self> {
		validate_queries(&queries)?;

		Ok(Self {
			queries,
			index,
			options,
			report,
			status: StatusPublisher::new(),
			executed: AtomicBool::new(false),
		})
	}

	pub fn status(&self) -> StatusHandle {
		self.status.handle()
	}

	pub fn queries(&self) -> &[NamedQuery] {
		&self.queries
	}

	/// Runs the whole pipeline once. A second call fails without doing any work.
	pub async fn execute(&self) -> Result<RunSummary> {
		if self.executed.swap(true, Ordering::AcqRel) {
			return Err(Error::AlreadyExecuted { operation: "TaggingRun::execute" });
		}

		let result = self.run().await;

		match &result {
			Ok(summary) => {
				tracing::info!(
					files_scored = summary.files_scored,
					rows = summary.artifact.rows_written,
					"Tagging run finished."
				);

				self.status.publish(RunPhase::Finished);
			},
			Err(err) => {
				tracing::error!(error = %err, "Tagging run failed.");

				self.status.publish(RunPhase::Failed);
			},
		}

		result
	}

	async fn run(&self) -> Result<RunSummary> {
		self.status.publish(RunPhase::Estimating);

		let estimate = estimator::estimate(
			&self.queries,
			Arc::clone(&self.index),
			self.options.estimator_threads,
			self.options.estimator_budget,
		)
		.await;

		self.status.publish(RunPhase::PreparingStorage);

		let scratch = ScratchDir::create(self.options.scratch_root.as_deref())?;
		let result = match open_store(self.options.scratch_backend, &scratch).await {
			Ok(mut store) => {
				let result = self.score_and_report(&estimate, &mut store).await;

				if let Err(err) = store.close().await {
					tracing::warn!(error = %err, "Failed to close scratch store.");
				}

				result
			},
			Err(err) => Err(err.into()),
		};

		self.status.publish(RunPhase::CleaningUp);

		if let Err(err) = scratch.close() {
			tracing::warn!(error = %err, "Failed to remove scratch directory.");
		}

		let (files_scored, rows, artifact) = result?;

		Ok(RunSummary { estimate: estimate.outcome, files_scored, rows, artifact })
	}

	async fn score_and_report(
		&self,
		estimate: &Estimate,
		store: &mut Box<dyn ScratchStore>,
	) -> Result<(u64, Vec<SortedRow>, ReportArtifact)> {
		self.status.publish(RunPhase::LoadingQueries);

		let records = self
			.queries
			.iter()
			.map(|query| QueryRecord {
				query_id: query.id,
				display_name: query.display_name.clone(),
				max_hits: query.max_hits,
				priority: query.priority,
			})
			.collect::<Vec<_>>();

		store.insert_queries(&records).await?;

		self.execute_queries(estimate, store).await?;
		self.status.publish(RunPhase::Aggregating);

		let files_scored = store.aggregate().await?;
		let rows = store.iterate_sorted().await?;

		tracing::info!(files_scored, backend = store.backend().as_str(), "Scores aggregated.");

		self.status.publish(RunPhase::WritingReport);

		let artifact = self.report.write(&self.queries, &rows).await?;

		Ok((files_scored, rows, artifact))
	}

	async fn execute_queries(
		&self,
		estimate: &Estimate,
		store: &mut Box<dyn ScratchStore>,
	) -> Result<()> {
		let total = self.queries.len();
		let workers = total.min(self.options.max_workers.max(1)).max(1);
		let permits = Arc::new(Semaphore::new(workers));
		let (tx, mut rx) = mpsc::channel::<ScoreBatch>(workers);
		let mut set = JoinSet::new();

		tracing::info!(queries = total, workers, "Executing queries.");

		for query in &self.queries {
			let limit =
				retrieval_limit(query, self.options.hard_hit_ceiling, estimate.hint(query.id));
			let query = query.clone();
			let index = Arc::clone(&self.index);
			let permits = Arc::clone(&permits);
			let tx = tx.clone();
			let policy = self.options.normalization;

			set.spawn(async move {
				let _permit = permits.acquire_owned().await.map_err(|_| Error::Worker {
					message: "Worker permits were closed.".to_string(),
				})?;
				let batch = run_query(index.as_ref(), &query, limit, policy).await?;

				tx.send(batch).await.map_err(|_| Error::Worker {
					message: "Score writer stopped before the batch was delivered.".to_string(),
				})?;

				Ok::<_, Error>(query.id)
			});
		}

		drop(tx);

		let mut ticker =
			time::interval(self.options.status_log_interval.max(Duration::from_millis(1)));
		let mut completed = 0;
		let mut applied = 0;
		let mut workers_done = false;
		let mut batches_done = false;

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		ticker.tick().await;
		self.status.publish(RunPhase::Executing { completed, total });

		while !(workers_done && batches_done) {
			tokio::select! {
				batch = rx.recv(), if !batches_done => match batch {
					Some(batch) => {
						if let Err(err) = store.apply_batch(&batch).await {
							set.abort_all();

							return Err(err.into());
						}

						applied += 1;
					},
					None => batches_done = true,
				},
				joined = set.join_next(), if !workers_done => match joined {
					Some(Ok(Ok(query_id))) => {
						completed += 1;

						tracing::debug!(query_id, completed, total, "Query finished.");

						self.status.publish(RunPhase::Executing { completed, total });
					},
					Some(Ok(Err(err))) => {
						set.abort_all();

						return Err(err);
					},
					Some(Err(err)) => {
						set.abort_all();

						return Err(err.into());
					},
					None => workers_done = true,
				},
				_ = ticker.tick() => {
					tracing::info!(completed, total, applied, "Query execution in progress.");
				},
			}
		}

		Ok(())
	}
}

/// Retrieval cap for one query: its own cap, or the ceiling when unlimited, narrowed by the
/// estimated hit count when one is known.
pub fn retrieval_limit(query: &NamedQuery, ceiling: u32, hint: Option<u64>) -> usize {
	let cap = query.hit_cap(ceiling);

	match hint {
		Some(hint) => cap.min(usize::try_from(hint.max(1)).unwrap_or(usize::MAX)),
		None => cap,
	}
}

async fn run_query(
	index: &dyn SearchIndex,
	query: &NamedQuery,
	limit: usize,
	policy: NormalizationPolicy,
) -> Result<ScoreBatch> {
	let hits = index.search(query, limit).await?;
	let mut batch = ScoreBatch::new(query.id);
	let mut displays = BTreeMap::new();
	let mut scored = HashSet::new();

	for (idx, hit) in hits.iter().take(limit).enumerate() {
		let rank = u32::try_from(idx + 1).unwrap_or(u32::MAX);
		let fields = index.document(hit.doc).await?;
		let file_id = truncate_field(fields.file_id, MAX_FILE_ID_CHARS, "file_id", query.id);
		let display_name =
			truncate_field(fields.display_name, MAX_DISPLAY_NAME_CHARS, "display_name", query.id);
		let relative_path = truncate_field(
			fields.relative_path,
			MAX_RELATIVE_PATH_CHARS,
			"relative_path",
			query.id,
		);

		// Hits arrive best first, so the first sighting of a file carries its best rank.
		if scored.insert(file_id.clone()) {
			batch.scores.push(ScoreRow {
				file_id: file_id.clone(),
				query_id: query.id,
				weight: policy.weight(rank, query.priority),
			});
		}

		displays.insert(file_id.clone(), DisplayEntry {
			file_id,
			display_name,
			relative_path,
			doc_address: hit.doc.0,
		});
	}

	batch.displays = displays.into_values().collect();

	tracing::debug!(
		query_id = query.id,
		hits = hits.len(),
		files = batch.scores.len(),
		limit,
		"Query retrieval finished."
	);

	Ok(batch)
}

fn truncate_field(
	value: String,
	max_chars: usize,
	field: &'static str,
	query_id: QueryId,
) -> String {
	let Some((cut, _)) = value.char_indices().nth(max_chars) else {
		return value;
	};
	let mut value = value;

	tracing::warn!(query_id, field, max_chars, "Field value truncated.");

	value.truncate(cut);

	value
}

fn validate_queries(queries: &[NamedQuery]) -> Result<()> {
	if queries.is_empty() {
		return Err(Error::InvalidRequest {
			message: "At least one named query is required.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for query in queries {
		if !seen.insert(query.id) {
			return Err(Error::InvalidRequest {
				message: format!("Query id {} is used more than once.", query.id),
			});
		}
		if query.max_hits == 0 || query.max_hits < NamedQuery::UNLIMITED {
			return Err(Error::InvalidRequest {
				message: format!("Query {} max_hits must be -1 or greater than zero.", query.id),
			});
		}
		if query.priority < NamedQuery::DEFAULT_PRIORITY {
			return Err(Error::InvalidRequest {
				message: format!("Query {} priority must be -1 or zero or greater.", query.id),
			});
		}
	}

	Ok(())
}
