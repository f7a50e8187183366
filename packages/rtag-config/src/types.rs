use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub estimator: Estimator,
	pub aggregator: Aggregator,
	pub report: Report,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Estimator {
	pub max_threads: u32,
	/// Wall-clock budget for hit counting. Counts still running at the deadline are dropped.
	pub max_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct Aggregator {
	#[serde(default = "default_max_workers")]
	pub max_workers: u32,
	/// Retrieval cap for queries whose `max_hits` is unlimited.
	#[serde(default = "default_hard_hit_ceiling")]
	pub hard_hit_ceiling: u32,
	/// One of one, inverse_rank, weighted_inverse_rank, or inverse_priority.
	pub normalization: String,
	/// One of sqlite or memory.
	#[serde(default = "default_scratch_backend")]
	pub scratch_backend: String,
	/// Optional. Parent directory for the per-run scratch directory; the system temp dir when
	/// absent.
	pub scratch_root: Option<PathBuf>,
	#[serde(default = "default_status_log_interval_ms")]
	pub status_log_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Report {
	/// One of live or static.
	pub mode: String,
	pub output: PathBuf,
	/// Optional. Zero means unlimited.
	pub top_n: Option<u32>,
	#[serde(default = "default_max_hyperlinks")]
	pub max_hyperlinks: u32,
	pub live_base_url: String,
	#[serde(default = "default_snapshot_suffix")]
	pub snapshot_suffix: String,
}

#[derive(Debug, Deserialize)]
pub struct QuerySet {
	#[serde(rename = "query", default)]
	pub queries: Vec<QueryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryEntry {
	pub id: i64,
	pub name: String,
	pub query: String,
	/// -1 means unlimited.
	#[serde(default = "default_unlimited")]
	pub max_hits: i64,
	/// -1 means the default priority.
	#[serde(default = "default_priority")]
	pub priority: i64,
}

fn default_max_workers() -> u32 {
	10
}

fn default_hard_hit_ceiling() -> u32 {
	100_000
}

fn default_scratch_backend() -> String {
	"sqlite".to_string()
}

fn default_status_log_interval_ms() -> u64 {
	2_000
}

fn default_max_hyperlinks() -> u32 {
	65_530
}

fn default_snapshot_suffix() -> String {
	".html".to_string()
}

fn default_unlimited() -> i64 {
	-1
}

fn default_priority() -> i64 {
	-1
}
