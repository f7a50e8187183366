pub mod aggregator;
pub mod estimator;
pub mod normalization;
pub mod providers;
pub mod report;
pub mod status;

mod error;

pub use aggregator::{RunOptions, RunSummary, TaggingRun};
pub use error::{Error, Result};
pub use estimator::{Estimate, EstimateOutcome};
pub use normalization::NormalizationPolicy;
pub use report::{ReportArtifact, ReportMode, ReportOptions, ReportWriter};
pub use rtag_storage::{BoxFuture, ScratchBackend, models::SortedRow};
pub use url;
pub use status::{RunPhase, StatusHandle};

use std::collections::BTreeMap;

pub type QueryId = i64;

/// A saved query with its result cap and priority. Immutable for the duration of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedQuery {
	pub id: QueryId,
	pub display_name: String,
	/// Compiled query text. Only the [`SearchIndex`] interprets it.
	pub query: String,
	/// [`NamedQuery::UNLIMITED`] or a positive cap.
	pub max_hits: i64,
	/// [`NamedQuery::DEFAULT_PRIORITY`] or a non-negative priority.
	pub priority: i64,
}
impl NamedQuery {
	pub const DEFAULT_PRIORITY: i64 = -1;
	pub const UNLIMITED: i64 = -1;

	pub fn new(id: QueryId, display_name: impl Into<String>, query: impl Into<String>) -> Self {
		Self {
			id,
			display_name: display_name.into(),
			query: query.into(),
			max_hits: Self::UNLIMITED,
			priority: Self::DEFAULT_PRIORITY,
		}
	}

	pub fn with_max_hits(mut self, max_hits: i64) -> Self {
		self.max_hits = max_hits;

		self
	}

	pub fn with_priority(mut self, priority: i64) -> Self {
		self.priority = priority;

		self
	}

	/// Retrieval cap, substituting `ceiling` for unlimited queries.
	pub fn hit_cap(&self, ceiling: u32) -> usize {
		if self.max_hits < 0 {
			return ceiling as usize;
		}

		usize::try_from(self.max_hits).unwrap_or(usize::MAX)
	}
}

impl From<rtag_config::QueryEntry> for NamedQuery {
	fn from(entry: rtag_config::QueryEntry) -> Self {
		Self {
			id: entry.id,
			display_name: entry.name,
			query: entry.query,
			max_hits: entry.max_hits,
			priority: entry.priority,
		}
	}
}

/// Internal, index-assigned document address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocAddress(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
	pub doc: DocAddress,
	pub score: f32,
}

/// Stored fields of one indexed document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentFields {
	pub doc: DocAddress,
	pub file_id: String,
	pub display_name: String,
	pub relative_path: String,
	pub fields: BTreeMap<String, String>,
}

/// Read-only document index shared by every worker of a run.
///
/// Implementations must be safe for concurrent reads from many tasks.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	/// Total matches without ranking.
	fn count<'a>(&'a self, query: &'a NamedQuery) -> BoxFuture<'a, Result<u64>>;

	/// At most `limit` hits in rank order, best first.
	///
	/// The order must be stable for one execution: the aggregator keeps only the first hit of
	/// each file, so a shuffled order changes scores.
	fn search<'a>(&'a self, query: &'a NamedQuery, limit: usize) -> BoxFuture<'a, Result<Vec<Hit>>>;

	fn document<'a>(&'a self, doc: DocAddress) -> BoxFuture<'a, Result<DocumentFields>>;
}

/// Renders a standalone highlighted view of one document for static reports.
pub trait HighlightRenderer
where
	Self: Send + Sync,
{
	/// `queries` holds exactly the queries that matched the document.
	fn render<'a>(
		&'a self,
		doc: &'a DocumentFields,
		queries: &'a [NamedQuery],
	) -> BoxFuture<'a, Result<String>>;
}
