pub mod corpus;
pub mod highlight;

mod error;

pub use error::{Error, Result};

use unicode_segmentation::UnicodeSegmentation;

/// Lowercased words of `text`, in order.
pub fn tokenize(text: &str) -> Vec<String> {
	text.unicode_words().map(str::to_lowercase).collect()
}

/// Positive terms of a corpus query. Terms prefixed with `-` are exclusions and are skipped.
pub fn query_terms(query: &str) -> Vec<String> {
	let mut terms = Vec::new();

	for raw in query.split_whitespace() {
		if raw.starts_with('-') {
			continue;
		}

		for term in tokenize(raw) {
			if !terms.contains(&term) {
				terms.push(term);
			}
		}
	}

	terms
}
