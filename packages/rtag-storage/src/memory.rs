use std::collections::{BTreeMap, HashMap};

use crate::{
	BoxFuture, Error, Result,
	models::{DisplayEntry, QueryRecord, ScoreBatch, ScoreRow, SortedRow},
	scratch::{ScratchBackend, ScratchStore},
};

/// Ordered in-memory scratch tables for small result sets.
#[derive(Debug, Default)]
pub struct MemoryStore {
	queries: HashMap<i64, QueryRecord>,
	// Keyed by (file, query) so per-file sums always add in query id order.
	scores: BTreeMap<(String, i64), f64>,
	displays: HashMap<String, DisplayEntry>,
	totals: Option<Vec<(String, f64)>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	fn ensure_writable(&self) -> Result<()> {
		if self.totals.is_some() {
			return Err(Error::InvalidArgument(
				"Scratch store is already aggregated; writes are closed.".to_string(),
			));
		}

		Ok(())
	}

	fn check_score(&self, row: &ScoreRow) -> Result<()> {
		if !self.queries.contains_key(&row.query_id) {
			return Err(Error::InvalidArgument(format!(
				"Score row references unknown query {}.",
				row.query_id
			)));
		}
		if self.scores.contains_key(&(row.file_id.clone(), row.query_id)) {
			return Err(Error::Conflict(format!(
				"Score row for file {:?} and query {} already exists.",
				row.file_id, row.query_id
			)));
		}

		Ok(())
	}

	fn insert_queries_now(&mut self, queries: &[QueryRecord]) -> Result<()> {
		self.ensure_writable()?;

		for query in queries {
			if self.queries.contains_key(&query.query_id) {
				return Err(Error::Conflict(format!(
					"Query {} is already registered.",
					query.query_id
				)));
			}
		}
		for query in queries {
			self.queries.insert(query.query_id, query.clone());
		}

		Ok(())
	}

	fn insert_score_now(&mut self, row: &ScoreRow) -> Result<()> {
		self.ensure_writable()?;
		self.check_score(row)?;
		self.scores.insert((row.file_id.clone(), row.query_id), row.weight);

		Ok(())
	}

	fn upsert_display_now(&mut self, entry: &DisplayEntry) -> Result<()> {
		self.ensure_writable()?;
		self.displays.insert(entry.file_id.clone(), entry.clone());

		Ok(())
	}

	fn apply_batch_now(&mut self, batch: &ScoreBatch) -> Result<()> {
		self.ensure_writable()?;

		// Validate everything first so a rejected batch leaves no trace.
		let mut pending = BTreeMap::new();

		for row in &batch.scores {
			self.check_score(row)?;

			if pending.insert((row.file_id.clone(), row.query_id), row.weight).is_some() {
				return Err(Error::Conflict(format!(
					"Batch for query {} scores file {:?} twice.",
					batch.query_id, row.file_id
				)));
			}
		}
		for entry in &batch.displays {
			self.displays.insert(entry.file_id.clone(), entry.clone());
		}

		self.scores.extend(pending);

		Ok(())
	}

	fn aggregate_now(&mut self) -> u64 {
		let mut totals: Vec<(String, f64)> = Vec::new();

		for ((file_id, _), weight) in &self.scores {
			match totals.last_mut() {
				Some((last, total)) if last == file_id => *total += weight,
				_ => totals.push((file_id.clone(), *weight)),
			}
		}

		let count = totals.len() as u64;

		self.totals = Some(totals);

		count
	}

	fn iterate_sorted_now(&self) -> Result<Vec<SortedRow>> {
		let Some(totals) = self.totals.as_ref() else {
			return Err(Error::InvalidArgument(
				"Scratch store has not been aggregated yet.".to_string(),
			));
		};
		let mut weights: HashMap<&str, BTreeMap<i64, f64>> = HashMap::new();

		for ((file_id, query_id), weight) in &self.scores {
			weights.entry(file_id.as_str()).or_default().insert(*query_id, *weight);
		}

		let mut rows = totals
			.iter()
			.map(|(file_id, total)| {
				let display = self.displays.get(file_id);

				SortedRow {
					file_id: file_id.clone(),
					total: *total,
					display_name: display
						.map(|entry| entry.display_name.clone())
						.unwrap_or_else(|| file_id.clone()),
					relative_path: display
						.map(|entry| entry.relative_path.clone())
						.unwrap_or_default(),
					doc_address: display.map(|entry| entry.doc_address),
					weights: weights.remove(file_id.as_str()).unwrap_or_default(),
				}
			})
			.collect::<Vec<_>>();

		rows.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.file_id.cmp(&b.file_id)));

		Ok(rows)
	}
}

impl ScratchStore for MemoryStore {
	fn backend(&self) -> ScratchBackend {
		ScratchBackend::Memory
	}

	fn insert_queries<'a>(&'a mut self, queries: &'a [QueryRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.insert_queries_now(queries) })
	}

	fn insert_score<'a>(&'a mut self, row: &'a ScoreRow) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.insert_score_now(row) })
	}

	fn upsert_display<'a>(&'a mut self, entry: &'a DisplayEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.upsert_display_now(entry) })
	}

	fn apply_batch<'a>(&'a mut self, batch: &'a ScoreBatch) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.apply_batch_now(batch) })
	}

	fn aggregate<'a>(&'a mut self) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(self.aggregate_now()) })
	}

	fn iterate_sorted<'a>(&'a self) -> BoxFuture<'a, Result<Vec<SortedRow>>> {
		Box::pin(async move { self.iterate_sorted_now() })
	}

	fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			drop(self);

			Ok(())
		})
	}
}
