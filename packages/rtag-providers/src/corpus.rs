//! In-memory document corpus loaded from JSON Lines.
//!
//! A query is a list of whitespace-separated terms. Every positive term must occur in a
//! document; terms prefixed with `-` must not. Hits are ranked by summed term frequency, ties
//! broken by document address, so one corpus always yields the same order.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	fs,
	path::Path,
};

use serde::Deserialize;

use crate::{Error, Result, tokenize};

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CorpusDocument {
	pub file_id: String,
	pub display_name: String,
	pub relative_path: String,
	#[serde(default)]
	pub fields: BTreeMap<String, String>,
}

#[derive(Debug)]
struct IndexedDocument {
	doc: CorpusDocument,
	term_counts: HashMap<String, u32>,
}

#[derive(Debug)]
struct ParsedQuery {
	required: Vec<String>,
	excluded: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CorpusIndex {
	docs: Vec<IndexedDocument>,
}
impl CorpusIndex {
	pub fn load(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;
		let mut docs = Vec::new();

		for (idx, line) in raw.lines().enumerate() {
			if line.trim().is_empty() {
				continue;
			}

			let doc: CorpusDocument = serde_json::from_str(line)
				.map_err(|err| Error::ParseCorpus { line: idx + 1, source: err })?;

			docs.push(doc);
		}

		tracing::info!(path = %path.display(), documents = docs.len(), "Corpus loaded.");

		Ok(Self::from_documents(docs))
	}

	pub fn from_documents(docs: Vec<CorpusDocument>) -> Self {
		let docs = docs
			.into_iter()
			.map(|doc| {
				let mut term_counts = HashMap::new();

				for text in std::iter::once(&doc.display_name).chain(doc.fields.values()) {
					for term in tokenize(text) {
						*term_counts.entry(term).or_insert(0) += 1;
					}
				}

				IndexedDocument { doc, term_counts }
			})
			.collect();

		Self { docs }
	}

	pub fn len(&self) -> usize {
		self.docs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.docs.is_empty()
	}

	pub fn count(&self, query: &str) -> Result<u64> {
		let parsed = parse_query(query)?;

		Ok(self.docs.iter().filter(|indexed| score(indexed, &parsed).is_some()).count() as u64)
	}

	/// Up to `limit` (address, score) pairs, best first.
	pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(u64, f32)>> {
		let parsed = parse_query(query)?;
		let mut hits = self
			.docs
			.iter()
			.enumerate()
			.filter_map(|(address, indexed)| {
				score(indexed, &parsed).map(|score| (address as u64, score))
			})
			.collect::<Vec<_>>();

		hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		hits.truncate(limit);

		Ok(hits.into_iter().map(|(address, score)| (address, score as f32)).collect())
	}

	pub fn document(&self, address: u64) -> Result<&CorpusDocument> {
		usize::try_from(address)
			.ok()
			.and_then(|idx| self.docs.get(idx))
			.map(|indexed| &indexed.doc)
			.ok_or(Error::UnknownDocument(address))
	}
}

fn parse_query(query: &str) -> Result<ParsedQuery> {
	let mut required = Vec::new();
	let mut excluded = Vec::new();

	for raw in query.split_whitespace() {
		match raw.strip_prefix('-') {
			Some(rest) => excluded.extend(tokenize(rest)),
			None => required.extend(tokenize(raw)),
		}
	}

	if required.is_empty() {
		return Err(Error::InvalidQuery {
			message: format!("Query {query:?} has no positive terms."),
		});
	}

	let mut seen = HashSet::new();

	required.retain(|term| seen.insert(term.clone()));

	Ok(ParsedQuery { required, excluded })
}

fn score(indexed: &IndexedDocument, query: &ParsedQuery) -> Option<u32> {
	if query.excluded.iter().any(|term| indexed.term_counts.contains_key(term)) {
		return None;
	}

	let mut total = 0_u32;

	for term in &query.required {
		total = total.saturating_add(*indexed.term_counts.get(term)?);
	}

	Some(total)
}
