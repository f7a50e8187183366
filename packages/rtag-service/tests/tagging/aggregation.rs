use std::sync::Arc;

use rtag_service::{
	EstimateOutcome, Error, NamedQuery, NormalizationPolicy, RunPhase, ScratchBackend,
	SearchIndex, TaggingRun,
};
use rtag_testkit::ScriptedIndex;

use super::{FILE_A, FILE_B, assert_close, live_writer, run_options, scenario, scratch_entries};

async fn scenario_ranks_files(backend: ScratchBackend) {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let scratch_root = dir.path().join("scratch");

	std::fs::create_dir_all(&scratch_root).expect("Failed to create scratch root.");

	let (queries, index) = scenario();
	let index: Arc<dyn SearchIndex> = Arc::new(index);
	let output = dir.path().join("tags.xlsx");
	let run = TaggingRun::new(
		queries,
		Arc::clone(&index),
		run_options(&scratch_root, backend),
		live_writer(&output, index),
	)
	.expect("Failed to create run.");
	let summary = run.execute().await.expect("Run failed.");
	let order = summary.rows.iter().map(|row| row.file_id.as_str()).collect::<Vec<_>>();

	assert_eq!(order, vec!["b", "a", "c"]);
	assert_close(summary.rows[0].total, 1.0 / 2_f64.sqrt() + 1.0);
	assert_close(summary.rows[1].total, 1.0);
	assert_close(summary.rows[2].total, 1.0 / 2_f64.sqrt());
	assert_eq!(summary.rows[0].matched_query_ids(), vec![1, 2]);
	assert_eq!(summary.rows[1].display_name, "a.txt");
	assert_eq!(summary.files_scored, 3);
	assert_eq!(summary.estimate, EstimateOutcome::Complete);
	assert_eq!(summary.artifact.rows_written, 3);
	assert!(output.is_file());
	assert_eq!(run.status().phase(), RunPhase::Finished);
	assert_eq!(scratch_entries(&scratch_root), 0);
}

#[tokio::test]
async fn scenario_ranks_files_with_sqlite_scratch() {
	scenario_ranks_files(ScratchBackend::Sqlite).await;
}

#[tokio::test]
async fn scenario_ranks_files_with_memory_scratch() {
	scenario_ranks_files(ScratchBackend::Memory).await;
}

#[tokio::test]
async fn repeated_hits_keep_the_best_rank() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let index = ScriptedIndex::new()
		.with_file(FILE_A, "a")
		.with_file(FILE_B, "b")
		.with_hits(1, &[FILE_A, FILE_B, FILE_A, FILE_A]);
	let index: Arc<dyn SearchIndex> = Arc::new(index);
	let mut options = run_options(dir.path(), ScratchBackend::Sqlite);

	options.normalization = NormalizationPolicy::InverseRank;

	let run = TaggingRun::new(
		vec![NamedQuery::new(1, "Q1", "q1")],
		Arc::clone(&index),
		options,
		live_writer(&dir.path().join("tags.xlsx"), index),
	)
	.expect("Failed to create run.");
	let summary = run.execute().await.expect("Run failed.");

	assert_eq!(summary.rows.len(), 2);
	assert_eq!(summary.rows[0].file_id, "a");
	assert_close(summary.rows[0].total, 1.0);
	assert_eq!(summary.rows[0].weights.len(), 1);
	assert_close(summary.rows[1].total, 0.5);
}

#[tokio::test]
async fn retrieval_is_capped_by_max_hits_and_estimate() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let index = Arc::new(
		ScriptedIndex::new()
			.with_file(FILE_A, "a")
			.with_file(FILE_B, "b")
			.with_hits(1, &[FILE_A, FILE_B])
			.with_hits(2, &[FILE_B, FILE_A]),
	);
	let queries =
		vec![NamedQuery::new(1, "Q1", "q1"), NamedQuery::new(2, "Q2", "q2").with_max_hits(1)];
	let run = TaggingRun::new(
		queries,
		index.clone(),
		run_options(dir.path(), ScratchBackend::Memory),
		live_writer(&dir.path().join("tags.xlsx"), index.clone()),
	)
	.expect("Failed to create run.");
	let summary = run.execute().await.expect("Run failed.");
	let mut limits = index.search_limits();

	limits.sort_unstable();

	assert_eq!(limits, vec![(1, 2), (2, 1)]);

	let b = summary.rows.iter().find(|row| row.file_id == "b").expect("Missing file b.");

	assert_eq!(b.matched_query_ids(), vec![1, 2]);

	let a = summary.rows.iter().find(|row| row.file_id == "a").expect("Missing file a.");

	assert_eq!(a.matched_query_ids(), vec![1]);
}

#[tokio::test]
async fn execute_is_single_use() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let (queries, index) = scenario();
	let index = Arc::new(index);
	let run = TaggingRun::new(
		queries,
		index.clone(),
		run_options(dir.path(), ScratchBackend::Memory),
		live_writer(&dir.path().join("tags.xlsx"), index.clone()),
	)
	.expect("Failed to create run.");

	run.execute().await.expect("First run failed.");

	let calls = index.search_calls();
	let err = run.execute().await.expect_err("Second run should fail.");

	assert!(matches!(err, Error::AlreadyExecuted { .. }));
	assert_eq!(index.search_calls(), calls);
	assert_eq!(run.status().phase(), RunPhase::Finished);
}

#[test]
fn empty_and_duplicate_query_sets_are_rejected() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let index: Arc<dyn SearchIndex> = Arc::new(ScriptedIndex::new());
	let empty = TaggingRun::new(
		Vec::new(),
		Arc::clone(&index),
		run_options(dir.path(), ScratchBackend::Memory),
		live_writer(&dir.path().join("tags.xlsx"), Arc::clone(&index)),
	);

	assert!(matches!(empty, Err(Error::InvalidRequest { .. })));

	let duplicate = TaggingRun::new(
		vec![NamedQuery::new(7, "A", "a"), NamedQuery::new(7, "B", "b")],
		Arc::clone(&index),
		run_options(dir.path(), ScratchBackend::Memory),
		live_writer(&dir.path().join("tags.xlsx"), index),
	);

	assert!(matches!(duplicate, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn worker_failure_fails_the_run_and_removes_scratch() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let scratch_root = dir.path().join("scratch");

	std::fs::create_dir_all(&scratch_root).expect("Failed to create scratch root.");

	let (queries, index) = scenario();
	let index: Arc<dyn SearchIndex> = Arc::new(index.with_document_failure(FILE_B));
	let output = dir.path().join("tags.xlsx");
	let run = TaggingRun::new(
		queries,
		Arc::clone(&index),
		run_options(&scratch_root, ScratchBackend::Sqlite),
		live_writer(&output, index),
	)
	.expect("Failed to create run.");
	let err = run.execute().await.expect_err("Run should fail.");

	assert!(matches!(err, Error::Index { .. }));
	assert_eq!(run.status().phase(), RunPhase::Failed);
	assert_eq!(scratch_entries(&scratch_root), 0);
	assert!(!output.exists());
}

#[tokio::test]
async fn search_failure_fails_the_run() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let (queries, index) = scenario();
	let index: Arc<dyn SearchIndex> = Arc::new(index.with_search_failure(3));
	let run = TaggingRun::new(
		queries,
		Arc::clone(&index),
		run_options(dir.path(), ScratchBackend::Memory),
		live_writer(&dir.path().join("tags.xlsx"), index),
	)
	.expect("Failed to create run.");

	assert!(matches!(run.execute().await, Err(Error::Index { .. })));
}
