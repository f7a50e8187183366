mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Aggregator, Config, Estimator, QueryEntry, QuerySet, Report, Service};

use std::{collections::HashSet, fs, path::Path};

pub const NORMALIZATION_POLICIES: [&str; 4] =
	["one", "inverse_rank", "weighted_inverse_rank", "inverse_priority"];
pub const SCRATCH_BACKENDS: [&str; 2] = ["sqlite", "memory"];
pub const REPORT_MODES: [&str; 2] = ["live", "static"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn load_queries(path: &Path) -> Result<Vec<QueryEntry>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let set: QuerySet = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate_queries(&set.queries)?;

	Ok(set.queries)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.estimator.max_threads == 0 {
		return Err(Error::Validation {
			message: "estimator.max_threads must be greater than zero.".to_string(),
		});
	}
	if cfg.estimator.max_seconds == 0 {
		return Err(Error::Validation {
			message: "estimator.max_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregator.max_workers == 0 {
		return Err(Error::Validation {
			message: "aggregator.max_workers must be greater than zero.".to_string(),
		});
	}
	if cfg.aggregator.hard_hit_ceiling == 0 {
		return Err(Error::Validation {
			message: "aggregator.hard_hit_ceiling must be greater than zero.".to_string(),
		});
	}
	if !NORMALIZATION_POLICIES.contains(&cfg.aggregator.normalization.as_str()) {
		return Err(Error::Validation {
			message: "aggregator.normalization must be one of one, inverse_rank, weighted_inverse_rank, or inverse_priority."
				.to_string(),
		});
	}
	if !SCRATCH_BACKENDS.contains(&cfg.aggregator.scratch_backend.as_str()) {
		return Err(Error::Validation {
			message: "aggregator.scratch_backend must be one of sqlite or memory.".to_string(),
		});
	}
	if cfg.aggregator.status_log_interval_ms == 0 {
		return Err(Error::Validation {
			message: "aggregator.status_log_interval_ms must be greater than zero.".to_string(),
		});
	}
	if !REPORT_MODES.contains(&cfg.report.mode.as_str()) {
		return Err(Error::Validation {
			message: "report.mode must be one of live or static.".to_string(),
		});
	}
	if cfg.report.output.as_os_str().is_empty() {
		return Err(Error::Validation { message: "report.output must be non-empty.".to_string() });
	}
	if cfg.report.output.file_stem().is_none() {
		return Err(Error::Validation {
			message: "report.output must name a file.".to_string(),
		});
	}
	if cfg.report.mode == "live" && cfg.report.live_base_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "report.live_base_url must be non-empty when report.mode is live.".to_string(),
		});
	}
	if cfg.report.mode == "static" && cfg.report.snapshot_suffix.trim().is_empty() {
		return Err(Error::Validation {
			message: "report.snapshot_suffix must be non-empty when report.mode is static."
				.to_string(),
		});
	}

	Ok(())
}

pub fn validate_queries(queries: &[QueryEntry]) -> Result<()> {
	if queries.is_empty() {
		return Err(Error::Validation {
			message: "Query set must contain at least one query.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for entry in queries {
		if !seen.insert(entry.id) {
			return Err(Error::Validation {
				message: format!("Query id {} is used more than once.", entry.id),
			});
		}
		if entry.name.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Query {} must have a non-empty name.", entry.id),
			});
		}
		if entry.query.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Query {} must have a non-empty query.", entry.id),
			});
		}
		if entry.max_hits != -1 && entry.max_hits < 1 {
			return Err(Error::Validation {
				message: format!("Query {} max_hits must be -1 or greater than zero.", entry.id),
			});
		}
		if entry.priority < -1 {
			return Err(Error::Validation {
				message: format!("Query {} priority must be -1 or zero or greater.", entry.id),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.aggregator
		.scratch_root
		.as_deref()
		.map(|root| root.as_os_str().is_empty())
		.unwrap_or(false)
	{
		cfg.aggregator.scratch_root = None;
	}
	if cfg.report.top_n == Some(0) {
		cfg.report.top_n = None;
	}

	cfg.aggregator.normalization = cfg.aggregator.normalization.trim().to_ascii_lowercase();
	cfg.aggregator.scratch_backend = cfg.aggregator.scratch_backend.trim().to_ascii_lowercase();
	cfg.report.mode = cfg.report.mode.trim().to_ascii_lowercase();
}
