use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRecord {
	pub query_id: i64,
	pub display_name: String,
	pub max_hits: i64,
	pub priority: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRow {
	pub file_id: String,
	pub query_id: i64,
	pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayEntry {
	pub file_id: String,
	pub display_name: String,
	pub relative_path: String,
	/// Internal index address of the latest sighting, used to re-read stored fields.
	pub doc_address: u64,
}

/// All writes produced by one query, applied in a single transaction.
#[derive(Clone, Debug, Default)]
pub struct ScoreBatch {
	pub query_id: i64,
	pub displays: Vec<DisplayEntry>,
	pub scores: Vec<ScoreRow>,
}
impl ScoreBatch {
	pub fn new(query_id: i64) -> Self {
		Self { query_id, ..Default::default() }
	}
}

/// One aggregated file joined with its display entry and per-query weights.
#[derive(Clone, Debug, PartialEq)]
pub struct SortedRow {
	pub file_id: String,
	pub total: f64,
	pub display_name: String,
	pub relative_path: String,
	pub doc_address: Option<u64>,
	pub weights: BTreeMap<i64, f64>,
}
impl SortedRow {
	pub fn matched_query_ids(&self) -> Vec<i64> {
		self.weights.keys().copied().collect()
	}
}
