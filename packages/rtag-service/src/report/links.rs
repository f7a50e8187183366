use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::QueryId;

/// Longest hyperlink target the workbook format accepts.
pub(crate) const MAX_URL_CHARS: usize = 2_079;

/// Re-executable search link for one file and the queries that matched it.
pub(crate) fn live_url(base: &Url, file_id: &str, query_ids: &[QueryId]) -> String {
	let mut url = base.clone();
	let ids = query_ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");

	url.query_pairs_mut().append_pair("file_id", file_id).append_pair("query_ids", &ids);

	url.into()
}

/// Snapshot location relative to the snapshot directory.
///
/// Root, prefix, `.` and `..` components are dropped so every snapshot stays inside the
/// directory. Falls back to the file id when nothing usable remains. A `tag` is appended to the
/// file name as `~<tag>` to separate rows whose paths sanitize to the same location.
pub(crate) fn snapshot_relative_path(
	relative_path: &str,
	file_id: &str,
	suffix: &str,
	tag: Option<&str>,
) -> PathBuf {
	let mut path = sanitize(relative_path);

	if path.as_os_str().is_empty() {
		path = sanitize(file_id);
	}
	if path.as_os_str().is_empty() {
		path = PathBuf::from("document");
	}

	let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();

	if let Some(tag) = tag {
		name.push("~");
		name.push(clean(tag));
	}

	name.push(suffix);
	path.set_file_name(name);

	path
}

/// Link from the report file to a snapshot, with `/` separators on every platform.
pub(crate) fn snapshot_link(snapshot_dir_name: &str, relative: &Path) -> String {
	let mut link = format!("file:///{snapshot_dir_name}");

	for component in relative.components() {
		link.push('/');
		link.push_str(&component.as_os_str().to_string_lossy());
	}

	link
}

// `#` would start a fragment and `%` an escape once the link is followed.
fn sanitize(raw: &str) -> PathBuf {
	let normalized = raw.replace('\\', "/");

	Path::new(&normalized)
		.components()
		.filter_map(|component| match component {
			Component::Normal(part) => Some(clean(&part.to_string_lossy())),
			_ => None,
		})
		.collect()
}

fn clean(part: &str) -> String {
	part.replace(['/', '\\', '#', '%'], "_")
}
