use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use calamine::{Data, Reader, Xlsx, open_workbook};
use rtag_service::{
	Error, HighlightRenderer, NamedQuery, ReportOptions, ReportWriter, SearchIndex, SortedRow,
};
use rtag_testkit::{RecordingRenderer, RenderCall, ScriptedIndex};

use super::{base_url, live_writer};

fn queries() -> Vec<NamedQuery> {
	vec![NamedQuery::new(1, "Q1", "q1"), NamedQuery::new(2, "Q2", "q2")]
}

fn row(address: u64, total: f64, weights: &[(i64, f64)]) -> SortedRow {
	SortedRow {
		file_id: format!("f{address}"),
		total,
		display_name: format!("f{address}.txt"),
		relative_path: format!("docs/f{address}.txt"),
		doc_address: Some(address),
		weights: weights.iter().copied().collect::<BTreeMap<_, _>>(),
	}
}

fn indexed(count: u64) -> ScriptedIndex {
	(0..count).fold(ScriptedIndex::new(), |index, address| {
		index.with_file(address, &format!("f{address}"))
	})
}

/// Three files with seven link-eligible cells: one file cell per row plus one per match.
fn seven_link_rows() -> Vec<SortedRow> {
	vec![row(0, 2.0, &[(1, 1.0), (2, 1.0)]), row(1, 1.0, &[(1, 1.0)]), row(2, 0.5, &[(2, 0.5)])]
}

fn snapshot_writer(output: &Path, files: u64, renderer: Arc<RecordingRenderer>) -> ReportWriter {
	ReportWriter::new(
		ReportOptions::snapshots(output),
		Arc::new(indexed(files)),
		Some(renderer as Arc<dyn HighlightRenderer>),
	)
	.expect("Failed to create report writer.")
}

fn read_snapshot(path: &Path) -> String {
	fs::read_to_string(path).expect("Failed to read snapshot.")
}

#[tokio::test]
async fn workbook_layout_has_query_columns_and_totals() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let output = dir.path().join("layout.xlsx");
	let writer = ReportWriter::new(
		ReportOptions::live(&output, base_url()).with_max_hyperlinks(2),
		Arc::new(indexed(3)),
		None,
	)
	.expect("Failed to create report writer.");

	writer.write(&queries(), &seven_link_rows()).await.expect("Write failed.");

	let mut workbook: Xlsx<_> = open_workbook(&output).expect("Failed to open report.");
	let sheet = workbook.worksheet_range("Tags").expect("Failed to read Tags sheet.");
	let header = (0..5)
		.map(|col| sheet.get_value((0, col)).cloned().unwrap_or(Data::Empty))
		.collect::<Vec<_>>();
	let cell = |row: u32, col: u32| sheet.get_value((row, col)).cloned().unwrap_or(Data::Empty);

	assert_eq!(header, vec![
		Data::String("File".to_string()),
		Data::String("Path".to_string()),
		Data::String("Q1".to_string()),
		Data::String("Q2".to_string()),
		Data::String("Total".to_string()),
	]);
	assert_eq!(cell(1, 0), Data::String("f0.txt".to_string()));
	assert_eq!(cell(1, 1), Data::String("docs/f0.txt".to_string()));
	// The budget covers the first file cell and its first match; later weights stay numeric.
	assert_eq!(cell(1, 2), Data::String("1.000".to_string()));
	assert_eq!(cell(1, 3), Data::Float(1.0));
	assert_eq!(cell(2, 2), Data::Float(1.0));
	assert_eq!(cell(2, 3), Data::Empty);
	assert_eq!(cell(3, 2), Data::Empty);
	assert_eq!(cell(3, 3), Data::Float(0.5));
	assert_eq!(cell(1, 4), Data::Float(2.0));
	assert_eq!(cell(2, 4), Data::Float(1.0));
	assert_eq!(cell(3, 4), Data::Float(0.5));
	assert_eq!(sheet.get_size(), (4, 5));
}

#[tokio::test]
async fn colliding_snapshot_paths_get_distinct_files() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let renderer = Arc::new(RecordingRenderer::new());
	let mut rooted = row(0, 2.0, &[(1, 1.0)]);
	let mut relative = row(1, 1.0, &[(1, 1.0)]);
	let mut third = row(2, 0.5, &[(1, 0.5)]);

	rooted.relative_path = "/x/a.txt".to_string();
	relative.relative_path = "x/a.txt".to_string();
	third.relative_path = "x\\a.txt".to_string();

	let writer = snapshot_writer(&dir.path().join("tags.xlsx"), 3, renderer);
	let artifact =
		writer.write(&queries(), &[rooted, relative, third]).await.expect("Write failed.");
	let snapshot_dir = artifact.snapshot_dir.expect("Missing snapshot dir.").join("x");

	assert_eq!(artifact.snapshots_written, 3);
	assert!(read_snapshot(&snapshot_dir.join("a.txt.html")).contains("f0.txt"));
	assert!(read_snapshot(&snapshot_dir.join("a.txt~f1.html")).contains("f1.txt"));
	assert!(read_snapshot(&snapshot_dir.join("a.txt~f2.html")).contains("f2.txt"));
}

#[tokio::test]
async fn snapshot_paths_drop_fragment_characters() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let mut sharp = row(0, 1.0, &[(1, 1.0)]);

	sharp.relative_path = "C#/notes.txt".to_string();

	let renderer = Arc::new(RecordingRenderer::new());
	let writer = snapshot_writer(&dir.path().join("tags.xlsx"), 1, renderer);
	let artifact = writer.write(&queries(), &[sharp]).await.expect("Write failed.");
	let snapshot_dir = artifact.snapshot_dir.expect("Missing snapshot dir.");

	assert_eq!(artifact.snapshots_written, 1);
	assert!(snapshot_dir.join("C_").join("notes.txt.html").is_file());
	assert!(!snapshot_dir.join("C#").exists());
}

#[tokio::test]
async fn live_links_stop_at_the_hyperlink_cap() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let index: Arc<dyn SearchIndex> = Arc::new(indexed(3));
	let capped = ReportWriter::new(
		ReportOptions::live(dir.path().join("capped.xlsx"), base_url()).with_max_hyperlinks(3),
		Arc::clone(&index),
		None,
	)
	.expect("Failed to create report writer.");
	let artifact = capped.write(&queries(), &seven_link_rows()).await.expect("Write failed.");

	assert_eq!(artifact.hyperlinks_written, 3);
	assert_eq!(artifact.rows_written, 3);
	assert!(!artifact.truncated);
	assert!(artifact.report_path.is_file());

	let uncapped = live_writer(&dir.path().join("full.xlsx"), index);
	let artifact = uncapped.write(&queries(), &seven_link_rows()).await.expect("Write failed.");

	assert_eq!(artifact.hyperlinks_written, 7);
	assert_eq!(artifact.snapshot_dir, None);
}

#[tokio::test]
async fn top_n_limits_rows_and_snapshots() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let index: Arc<dyn SearchIndex> = Arc::new(indexed(5));
	let renderer = Arc::new(RecordingRenderer::new());
	let rows =
		(0..5).map(|address| row(address, 5.0 - address as f64, &[(1, 1.0)])).collect::<Vec<_>>();
	let writer = ReportWriter::new(
		ReportOptions::snapshots(dir.path().join("tags.xlsx")).with_top_n(Some(2)),
		index,
		Some(renderer.clone() as Arc<dyn HighlightRenderer>),
	)
	.expect("Failed to create report writer.");
	let artifact = writer.write(&queries(), &rows).await.expect("Write failed.");

	assert_eq!(artifact.rows_written, 2);
	assert_eq!(artifact.snapshots_written, 2);
	assert!(artifact.truncated);
	assert_eq!(renderer.calls().len(), 2);

	let snapshot_dir = artifact.snapshot_dir.expect("Missing snapshot dir.");

	assert_eq!(snapshot_dir, dir.path().join("tags_files"));
	assert!(snapshot_dir.join("docs").join("f0.txt.html").is_file());
	assert!(snapshot_dir.join("docs").join("f1.txt.html").is_file());
	assert!(!snapshot_dir.join("docs").join("f2.txt.html").exists());
}

#[tokio::test]
async fn snapshots_render_only_the_matched_queries() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let renderer = Arc::new(RecordingRenderer::new());
	let mut unindexed = row(9, 0.1, &[(1, 0.1)]);

	unindexed.doc_address = None;

	let rows = vec![row(0, 2.0, &[(1, 1.0), (2, 1.0)]), row(1, 1.0, &[(2, 1.0)]), unindexed];
	let writer = ReportWriter::new(
		ReportOptions::snapshots(dir.path().join("tags.xlsx")),
		Arc::new(indexed(2)),
		Some(renderer.clone() as Arc<dyn HighlightRenderer>),
	)
	.expect("Failed to create report writer.");
	let artifact = writer.write(&queries(), &rows).await.expect("Write failed.");

	assert_eq!(artifact.rows_written, 3);
	assert_eq!(artifact.snapshots_written, 2);
	assert_eq!(artifact.hyperlinks_written, 2);
	assert_eq!(renderer.calls(), vec![
		RenderCall { file_id: "f0".to_string(), query_ids: vec![1, 2] },
		RenderCall { file_id: "f1".to_string(), query_ids: vec![2] },
	]);
}

#[tokio::test]
async fn write_is_single_use() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let output = dir.path().join("tags.xlsx");
	let writer = live_writer(&output, Arc::new(indexed(3)));

	writer.write(&queries(), &seven_link_rows()).await.expect("First write failed.");
	std::fs::remove_file(&output).expect("Failed to remove report.");

	let err = writer
		.write(&queries(), &seven_link_rows())
		.await
		.expect_err("Second write should fail.");

	assert!(matches!(err, Error::AlreadyExecuted { .. }));
	assert!(!output.exists());
}

#[test]
fn static_reports_require_a_renderer() {
	let result = ReportWriter::new(
		ReportOptions::snapshots("tags.xlsx"),
		Arc::new(ScriptedIndex::new()),
		None,
	);

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn failed_write_removes_partial_output() {
	let dir = tempfile::tempdir().expect("Failed to create temp dir.");
	let output = dir.path().join("tags.xlsx");
	let writer = ReportWriter::new(
		ReportOptions::snapshots(&output),
		Arc::new(indexed(3)),
		Some(Arc::new(RecordingRenderer::failing())),
	)
	.expect("Failed to create report writer.");
	let err = writer.write(&queries(), &seven_link_rows()).await.expect_err("Write should fail.");

	assert!(matches!(err, Error::Render { .. }));
	assert!(!output.exists());
	assert!(!dir.path().join("tags_files").exists());
}
