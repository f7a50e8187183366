use std::{
	collections::{BTreeMap, HashMap},
	path::Path,
};

use sqlx::{
	SqliteConnection, SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
	BoxFuture, Error, Result,
	models::{DisplayEntry, QueryRecord, ScoreBatch, ScoreRow, SortedRow},
	schema,
	scratch::{ScratchBackend, ScratchStore},
};

pub const SCRATCH_DB_FILE: &str = "scratch.sqlite3";

/// Embedded transactional scratch tables in a file under the run's scratch directory.
pub struct SqliteStore {
	pool: SqlitePool,
	aggregated: bool,
}
impl SqliteStore {
	pub async fn open(dir: &Path) -> Result<Self> {
		let options =
			SqliteConnectOptions::new().filename(dir.join(SCRATCH_DB_FILE)).create_if_missing(true);
		// One connection: the store is single-writer and every write goes through a transaction.
		let pool = SqlitePoolOptions::new().max_connections(1).connect_with(options).await?;
		let store = Self { pool, aggregated: false };

		store.ensure_schema().await?;

		Ok(store)
	}

	async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	fn ensure_writable(&self) -> Result<()> {
		if self.aggregated {
			return Err(Error::InvalidArgument(
				"Scratch store is already aggregated; writes are closed.".to_string(),
			));
		}

		Ok(())
	}

	async fn insert_queries_tx(&mut self, queries: &[QueryRecord]) -> Result<()> {
		self.ensure_writable()?;

		let mut tx = self.pool.begin().await?;

		for query in queries {
			sqlx::query(
				"\
INSERT INTO named_queries (query_id, display_name, max_hits, priority)
VALUES (?1, ?2, ?3, ?4)",
			)
			.bind(query.query_id)
			.bind(query.display_name.as_str())
			.bind(query.max_hits)
			.bind(query.priority)
			.execute(&mut *tx)
			.await
			.map_err(classify)?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn insert_score_tx(&mut self, row: &ScoreRow) -> Result<()> {
		self.ensure_writable()?;

		let mut tx = self.pool.begin().await?;

		insert_score_exec(&mut tx, row).await?;

		tx.commit().await?;

		Ok(())
	}

	async fn upsert_display_tx(&mut self, entry: &DisplayEntry) -> Result<()> {
		self.ensure_writable()?;

		let mut tx = self.pool.begin().await?;

		upsert_display_exec(&mut tx, entry).await?;

		tx.commit().await?;

		Ok(())
	}

	async fn apply_batch_tx(&mut self, batch: &ScoreBatch) -> Result<()> {
		self.ensure_writable()?;

		let mut tx = self.pool.begin().await?;

		for entry in &batch.displays {
			upsert_display_exec(&mut tx, entry).await?;
		}
		for row in &batch.scores {
			insert_score_exec(&mut tx, row).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn aggregate_tx(&mut self) -> Result<u64> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM aggregate_scores").execute(&mut *tx).await?;
		// score_rows is clustered on (file_id, query_id), so each group is summed in query id
		// order and totals are bit-identical across runs.
		sqlx::query(
			"\
INSERT INTO aggregate_scores (file_id, total)
SELECT file_id, SUM(weight)
FROM score_rows
GROUP BY file_id",
		)
		.execute(&mut *tx)
		.await?;

		let count: i64 =
			sqlx::query_scalar("SELECT COUNT(*) FROM aggregate_scores").fetch_one(&mut *tx).await?;

		tx.commit().await?;

		self.aggregated = true;

		Ok(u64::try_from(count).unwrap_or_default())
	}

	async fn iterate_sorted_query(&self) -> Result<Vec<SortedRow>> {
		if !self.aggregated {
			return Err(Error::InvalidArgument(
				"Scratch store has not been aggregated yet.".to_string(),
			));
		}

		let totals: Vec<(String, f64, Option<String>, Option<String>, Option<i64>)> =
			sqlx::query_as(
				"\
SELECT a.file_id, a.total, d.display_name, d.relative_path, d.doc_address
FROM aggregate_scores a
LEFT JOIN display_index d ON d.file_id = a.file_id
ORDER BY a.total DESC, a.file_id ASC",
			)
			.fetch_all(&self.pool)
			.await?;
		let scores: Vec<(String, i64, f64)> =
			sqlx::query_as("SELECT file_id, query_id, weight FROM score_rows")
				.fetch_all(&self.pool)
				.await?;
		let mut weights: HashMap<String, BTreeMap<i64, f64>> = HashMap::new();

		for (file_id, query_id, weight) in scores {
			weights.entry(file_id).or_default().insert(query_id, weight);
		}

		Ok(totals
			.into_iter()
			.map(|(file_id, total, display_name, relative_path, doc_address)| SortedRow {
				display_name: display_name.unwrap_or_else(|| file_id.clone()),
				relative_path: relative_path.unwrap_or_default(),
				doc_address: doc_address.and_then(|value| u64::try_from(value).ok()),
				weights: weights.remove(&file_id).unwrap_or_default(),
				file_id,
				total,
			})
			.collect())
	}
}

impl ScratchStore for SqliteStore {
	fn backend(&self) -> ScratchBackend {
		ScratchBackend::Sqlite
	}

	fn insert_queries<'a>(&'a mut self, queries: &'a [QueryRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.insert_queries_tx(queries))
	}

	fn insert_score<'a>(&'a mut self, row: &'a ScoreRow) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.insert_score_tx(row))
	}

	fn upsert_display<'a>(&'a mut self, entry: &'a DisplayEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_display_tx(entry))
	}

	fn apply_batch<'a>(&'a mut self, batch: &'a ScoreBatch) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.apply_batch_tx(batch))
	}

	fn aggregate<'a>(&'a mut self) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.aggregate_tx())
	}

	fn iterate_sorted<'a>(&'a self) -> BoxFuture<'a, Result<Vec<SortedRow>>> {
		Box::pin(self.iterate_sorted_query())
	}

	fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>> {
		Box::pin(async move {
			self.pool.close().await;

			Ok(())
		})
	}
}

async fn insert_score_exec(conn: &mut SqliteConnection, row: &ScoreRow) -> Result<()> {
	sqlx::query("INSERT INTO score_rows (file_id, query_id, weight) VALUES (?1, ?2, ?3)")
		.bind(row.file_id.as_str())
		.bind(row.query_id)
		.bind(row.weight)
		.execute(conn)
		.await
		.map_err(classify)?;

	Ok(())
}

async fn upsert_display_exec(conn: &mut SqliteConnection, entry: &DisplayEntry) -> Result<()> {
	let doc_address = i64::try_from(entry.doc_address).map_err(|_| {
		Error::InvalidArgument(format!(
			"Document address {} exceeds supported range.",
			entry.doc_address
		))
	})?;

	sqlx::query(
		"\
INSERT INTO display_index (file_id, display_name, relative_path, doc_address)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (file_id) DO UPDATE
SET
	display_name = excluded.display_name,
	relative_path = excluded.relative_path,
	doc_address = excluded.doc_address",
	)
	.bind(entry.file_id.as_str())
	.bind(entry.display_name.as_str())
	.bind(entry.relative_path.as_str())
	.bind(doc_address)
	.execute(conn)
	.await?;

	Ok(())
}

fn classify(err: sqlx::Error) -> Error {
	let Some(db_err) = err.as_database_error() else {
		return Error::Sqlx(err);
	};

	if db_err.is_unique_violation() {
		return Error::Conflict(db_err.message().to_string());
	}
	if db_err.is_foreign_key_violation() {
		return Error::InvalidArgument(db_err.message().to_string());
	}

	Error::Sqlx(err)
}
