//! [`SearchIndex`] and [`HighlightRenderer`] over the bundled corpus providers.

use rtag_providers::{
	corpus::CorpusIndex,
	highlight::{HighlightQuery, HtmlHighlighter},
	query_terms,
};

use crate::{
	BoxFuture, DocAddress, DocumentFields, HighlightRenderer, Hit, NamedQuery, Result, SearchIndex,
};

impl SearchIndex for CorpusIndex {
	fn count<'a>(&'a self, query: &'a NamedQuery) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(CorpusIndex::count(self, &query.query)?) })
	}

	fn search<'a>(
		&'a self,
		query: &'a NamedQuery,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<Hit>>> {
		Box::pin(async move {
			let hits = CorpusIndex::search(self, &query.query, limit)?;

			Ok(hits
				.into_iter()
				.map(|(address, score)| Hit { doc: DocAddress(address), score })
				.collect())
		})
	}

	fn document<'a>(&'a self, doc: DocAddress) -> BoxFuture<'a, Result<DocumentFields>> {
		Box::pin(async move {
			let stored = CorpusIndex::document(self, doc.0)?;

			Ok(DocumentFields {
				doc,
				file_id: stored.file_id.clone(),
				display_name: stored.display_name.clone(),
				relative_path: stored.relative_path.clone(),
				fields: stored.fields.clone(),
			})
		})
	}
}

impl HighlightRenderer for HtmlHighlighter {
	fn render<'a>(
		&'a self,
		doc: &'a DocumentFields,
		queries: &'a [NamedQuery],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let queries = queries
				.iter()
				.map(|query| HighlightQuery {
					label: query.display_name.clone(),
					terms: query_terms(&query.query),
				})
				.collect::<Vec<_>>();

			Ok(HtmlHighlighter::render(
				self,
				&doc.display_name,
				&doc.relative_path,
				&doc.fields,
				&queries,
			))
		})
	}
}
