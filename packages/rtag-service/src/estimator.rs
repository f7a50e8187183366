//! Best-effort hit counting under a wall-clock budget.
//!
//! Counts size the later ranked retrieval. A count that fails or does not finish in time is
//! left out of [`Estimate::counts`] and reported in [`EstimateOutcome::Partial`].

use std::{
	collections::{BTreeSet, HashMap},
	sync::Arc,
	time::Duration,
};

use tokio::{
	sync::Semaphore,
	task::JoinSet,
	time::{self, Instant},
};

use crate::{Error, NamedQuery, QueryId, SearchIndex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EstimateOutcome {
	Complete,
	Partial { timed_out: Vec<QueryId>, failed: Vec<QueryId> },
}

#[derive(Clone, Debug)]
pub struct Estimate {
	pub counts: HashMap<QueryId, u64>,
	pub outcome: EstimateOutcome,
}
impl Estimate {
	pub fn is_complete(&self) -> bool {
		self.outcome == EstimateOutcome::Complete
	}

	pub fn hint(&self, query_id: QueryId) -> Option<u64> {
		self.counts.get(&query_id).copied()
	}
}

/// Counts hits for every query with at most `min(queries, max_threads)` counts in flight.
///
/// Counts still running when `budget` elapses are aborted and their results dropped.
pub async fn estimate(
	queries: &[NamedQuery],
	index: Arc<dyn SearchIndex>,
	max_threads: usize,
	budget: Duration,
) -> Estimate {
	let deadline = Instant::now() + budget;
	let workers = queries.len().min(max_threads.max(1)).max(1);
	let permits = Arc::new(Semaphore::new(workers));
	let mut pending = queries.iter().map(|query| query.id).collect::<BTreeSet<_>>();
	let mut counts = HashMap::with_capacity(queries.len());
	let mut failed = Vec::new();
	let mut set = JoinSet::new();
	let mut tasks = HashMap::with_capacity(queries.len());

	tracing::info!(
		queries = queries.len(),
		workers,
		budget_ms = budget.as_millis() as u64,
		"Estimating hit counts."
	);

	for query in queries {
		let query = query.clone();
		let index = Arc::clone(&index);
		let permits = Arc::clone(&permits);
		let query_id = query.id;

		let handle = set.spawn(async move {
			let Ok(_permit) = permits.acquire_owned().await else {
				return (
					query.id,
					Err(Error::Worker { message: "Count permits were closed.".to_string() }),
				);
			};
			let result = index.count(&query).await;

			(query.id, result)
		});

		tasks.insert(handle.id(), query_id);
	}

	let mut timed_out = false;

	loop {
		match time::timeout_at(deadline, set.join_next()).await {
			Ok(Some(Ok((query_id, Ok(count))))) => {
				pending.remove(&query_id);
				counts.insert(query_id, count);
			},
			Ok(Some(Ok((query_id, Err(err))))) => {
				tracing::warn!(
					query_id,
					error = %err,
					"Hit count failed; dropping it from the estimate."
				);

				pending.remove(&query_id);
				failed.push(query_id);
			},
			Ok(Some(Err(err))) => {
				let Some(query_id) = tasks.get(&err.id()).copied() else {
					tracing::warn!(error = %err, "Hit count task did not complete.");

					continue;
				};

				tracing::warn!(
					query_id,
					error = %err,
					"Hit count task did not complete; dropping it from the estimate."
				);

				pending.remove(&query_id);
				failed.push(query_id);
			},
			Ok(None) => break,
			Err(_) => {
				timed_out = true;

				set.abort_all();

				break;
			},
		}
	}

	let outcome = if timed_out {
		let timed_out = pending.into_iter().collect::<Vec<_>>();

		tracing::warn!(
			timed_out = timed_out.len(),
			failed = failed.len(),
			"Hit count budget elapsed; unfinished counts were abandoned."
		);

		failed.sort_unstable();

		EstimateOutcome::Partial { timed_out, failed }
	} else {
		failed.extend(pending);
		failed.sort_unstable();

		if failed.is_empty() {
			EstimateOutcome::Complete
		} else {
			EstimateOutcome::Partial { timed_out: Vec::new(), failed }
		}
	};

	tracing::info!(
		counted = counts.len(),
		complete = outcome == EstimateOutcome::Complete,
		"Hit count estimation finished."
	);

	Estimate { counts, outcome }
}
