use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::{
	BoxFuture, Error, Result,
	memory::MemoryStore,
	models::{DisplayEntry, QueryRecord, ScoreBatch, ScoreRow, SortedRow},
	sqlite::SqliteStore,
};

const SCRATCH_DIR_PREFIX: &str = "rtag-scratch-";

/// Repository interface over the per-run scratch tables.
///
/// A store has exactly one writer. Totals are only readable after [`ScratchStore::aggregate`]
/// and every write after that point is rejected, so callers never observe a partial aggregate.
pub trait ScratchStore
where
	Self: Send + Sync,
{
	fn backend(&self) -> ScratchBackend;

	fn insert_queries<'a>(&'a mut self, queries: &'a [QueryRecord]) -> BoxFuture<'a, Result<()>>;

	/// Fails with [`Error::Conflict`] when the (file, query) pair already has a row.
	fn insert_score<'a>(&'a mut self, row: &'a ScoreRow) -> BoxFuture<'a, Result<()>>;

	/// Later entries for the same file overwrite earlier ones.
	fn upsert_display<'a>(&'a mut self, entry: &'a DisplayEntry) -> BoxFuture<'a, Result<()>>;

	/// Applies every display upsert and score insert of one query atomically.
	fn apply_batch<'a>(&'a mut self, batch: &'a ScoreBatch) -> BoxFuture<'a, Result<()>>;

	/// Sums weights per file and returns the number of scored files.
	fn aggregate<'a>(&'a mut self) -> BoxFuture<'a, Result<u64>>;

	/// Rows ordered by total descending, then file id ascending.
	fn iterate_sorted<'a>(&'a self) -> BoxFuture<'a, Result<Vec<SortedRow>>>;

	fn close(self: Box<Self>) -> BoxFuture<'static, Result<()>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchBackend {
	Memory,
	Sqlite,
}
impl ScratchBackend {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"memory" => Ok(Self::Memory),
			"sqlite" => Ok(Self::Sqlite),
			other => Err(Error::InvalidArgument(format!("Unknown scratch backend {other:?}."))),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Memory => "memory",
			Self::Sqlite => "sqlite",
		}
	}
}

/// Fresh temp directory owned by one run. Removed on [`ScratchDir::close`] or on drop.
pub struct ScratchDir {
	dir: TempDir,
}
impl ScratchDir {
	pub fn create(root: Option<&Path>) -> Result<Self> {
		let mut builder = Builder::new();

		builder.prefix(SCRATCH_DIR_PREFIX);

		let dir = match root {
			Some(root) => builder.tempdir_in(root)?,
			None => builder.tempdir()?,
		};

		tracing::debug!(path = %dir.path().display(), "Scratch directory created.");

		Ok(Self { dir })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn close(self) -> Result<PathBuf> {
		let path = self.dir.path().to_path_buf();

		self.dir.close()?;

		tracing::debug!(path = %path.display(), "Scratch directory removed.");

		Ok(path)
	}
}

pub async fn open_store(
	backend: ScratchBackend,
	dir: &ScratchDir,
) -> Result<Box<dyn ScratchStore>> {
	match backend {
		ScratchBackend::Memory => Ok(Box::new(MemoryStore::new())),
		ScratchBackend::Sqlite => {
			let store = SqliteStore::open(dir.path()).await?;

			Ok(Box::new(store))
		},
	}
}
