//! Deterministic collaborators for tagging tests.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::Mutex,
	time::Duration,
};

use tokio::time;

use rtag_service::{
	BoxFuture, DocAddress, DocumentFields, Error, HighlightRenderer, Hit, NamedQuery, QueryId,
	Result, SearchIndex,
};

/// Index whose hits per query are scripted up front, in rank order.
#[derive(Debug, Default)]
pub struct ScriptedIndex {
	docs: BTreeMap<u64, DocumentFields>,
	hits: HashMap<QueryId, Vec<DocAddress>>,
	count_delays: HashMap<QueryId, Duration>,
	count_failures: HashSet<QueryId>,
	count_panics: HashSet<QueryId>,
	search_failures: HashSet<QueryId>,
	document_failures: HashSet<u64>,
	search_limits: Mutex<Vec<(QueryId, usize)>>,
}
impl ScriptedIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a document whose display name and relative path derive from `file_id`.
	pub fn with_file(self, address: u64, file_id: &str) -> Self {
		let display_name = format!("{file_id}.txt");
		let relative_path = format!("docs/{file_id}.txt");

		self.with_document(address, file_id, &display_name, &relative_path)
	}

	pub fn with_document(
		mut self,
		address: u64,
		file_id: &str,
		display_name: &str,
		relative_path: &str,
	) -> Self {
		self.docs.insert(address, DocumentFields {
			doc: DocAddress(address),
			file_id: file_id.to_string(),
			display_name: display_name.to_string(),
			relative_path: relative_path.to_string(),
			fields: BTreeMap::from([("body".to_string(), format!("Body of {file_id}."))]),
		});

		self
	}

	/// Hits for `query_id`, best first. Addresses may repeat.
	pub fn with_hits(mut self, query_id: QueryId, addresses: &[u64]) -> Self {
		self.hits.insert(query_id, addresses.iter().copied().map(DocAddress).collect());

		self
	}

	pub fn with_count_delay(mut self, query_id: QueryId, delay: Duration) -> Self {
		self.count_delays.insert(query_id, delay);

		self
	}

	pub fn with_count_failure(mut self, query_id: QueryId) -> Self {
		self.count_failures.insert(query_id);

		self
	}

	pub fn with_count_panic(mut self, query_id: QueryId) -> Self {
		self.count_panics.insert(query_id);

		self
	}

	pub fn with_search_failure(mut self, query_id: QueryId) -> Self {
		self.search_failures.insert(query_id);

		self
	}

	pub fn with_document_failure(mut self, address: u64) -> Self {
		self.document_failures.insert(address);

		self
	}

	/// Every `(query id, limit)` passed to `search`, in call order.
	pub fn search_limits(&self) -> Vec<(QueryId, usize)> {
		self.search_limits.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn search_calls(&self) -> usize {
		self.search_limits.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}

impl SearchIndex for ScriptedIndex {
	fn count<'a>(&'a self, query: &'a NamedQuery) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			if let Some(delay) = self.count_delays.get(&query.id) {
				time::sleep(*delay).await;
			}
			if self.count_panics.contains(&query.id) {
				panic!("Count panicked for query {}.", query.id);
			}
			if self.count_failures.contains(&query.id) {
				return Err(Error::Index {
					message: format!("Count failed for query {}.", query.id),
				});
			}

			Ok(self.hits.get(&query.id).map_or(0, |hits| hits.len() as u64))
		})
	}

	fn search<'a>(
		&'a self,
		query: &'a NamedQuery,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<Hit>>> {
		Box::pin(async move {
			let mut limits = self.search_limits.lock().unwrap_or_else(|err| err.into_inner());

			limits.push((query.id, limit));
			drop(limits);

			if self.search_failures.contains(&query.id) {
				return Err(Error::Index {
					message: format!("Search failed for query {}.", query.id),
				});
			}

			let hits = self.hits.get(&query.id).map(Vec::as_slice).unwrap_or_default();

			Ok(hits
				.iter()
				.take(limit)
				.enumerate()
				.map(|(idx, doc)| Hit { doc: *doc, score: 1.0 / (idx + 1) as f32 })
				.collect())
		})
	}

	fn document<'a>(&'a self, doc: DocAddress) -> BoxFuture<'a, Result<DocumentFields>> {
		Box::pin(async move {
			if self.document_failures.contains(&doc.0) {
				return Err(Error::Index { message: format!("Failed to read document {}.", doc.0) });
			}

			self.docs
				.get(&doc.0)
				.cloned()
				.ok_or_else(|| Error::Index { message: format!("Unknown document {}.", doc.0) })
		})
	}
}

/// One `render` call: the file and the ids of the queries it was rendered for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderCall {
	pub file_id: String,
	pub query_ids: Vec<QueryId>,
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
	calls: Mutex<Vec<RenderCall>>,
	fail: bool,
}
impl RecordingRenderer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Default::default() }
	}

	pub fn calls(&self) -> Vec<RenderCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

impl HighlightRenderer for RecordingRenderer {
	fn render<'a>(
		&'a self,
		doc: &'a DocumentFields,
		queries: &'a [NamedQuery],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(RenderCall {
				file_id: doc.file_id.clone(),
				query_ids: queries.iter().map(|query| query.id).collect(),
			});

			if self.fail {
				return Err(Error::Render {
					message: format!("Render failed for {}.", doc.file_id),
				});
			}

			Ok(format!("<html><body>{}</body></html>", doc.display_name))
		})
	}
}
