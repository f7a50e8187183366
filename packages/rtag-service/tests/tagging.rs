mod tagging {
	mod aggregation;
	mod estimator;
	mod report;

	use std::{path::Path, sync::Arc, time::Duration};

	use rtag_service::{
		NamedQuery, NormalizationPolicy, ReportOptions, ReportWriter, RunOptions, ScratchBackend,
		SearchIndex, url::Url,
	};
	use rtag_testkit::ScriptedIndex;

	const FILE_A: u64 = 0;
	const FILE_B: u64 = 1;
	const FILE_C: u64 = 2;

	/// Q1 matches A then B, Q2 matches B then C, Q3 matches nothing.
	fn scenario() -> (Vec<NamedQuery>, ScriptedIndex) {
		let queries = vec![
			NamedQuery::new(1, "Q1", "q1").with_priority(1),
			NamedQuery::new(2, "Q2", "q2").with_priority(2),
			NamedQuery::new(3, "Q3", "q3"),
		];
		let index = ScriptedIndex::new()
			.with_file(FILE_A, "a")
			.with_file(FILE_B, "b")
			.with_file(FILE_C, "c")
			.with_hits(1, &[FILE_A, FILE_B])
			.with_hits(2, &[FILE_B, FILE_C]);

		(queries, index)
	}

	fn run_options(scratch_root: &Path, backend: ScratchBackend) -> RunOptions {
		RunOptions {
			estimator_threads: 2,
			estimator_budget: Duration::from_secs(5),
			max_workers: 3,
			hard_hit_ceiling: 1_000,
			normalization: NormalizationPolicy::WeightedInverseRank,
			scratch_backend: backend,
			scratch_root: Some(scratch_root.to_path_buf()),
			status_log_interval: Duration::from_millis(50),
		}
	}

	fn base_url() -> Url {
		Url::parse("http://127.0.0.1:8080/search").expect("Failed to parse base URL.")
	}

	fn live_writer(output: &Path, index: Arc<dyn SearchIndex>) -> ReportWriter {
		ReportWriter::new(ReportOptions::live(output, base_url()), index, None)
			.expect("Failed to create report writer.")
	}

	fn assert_close(actual: f64, expected: f64) {
		assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
	}

	fn scratch_entries(root: &Path) -> usize {
		std::fs::read_dir(root).expect("Failed to list scratch root.").count()
	}
}
