//! Standalone HTML snapshots with matched terms marked per query.

use std::collections::{BTreeMap, HashMap};

use unicode_segmentation::UnicodeSegmentation;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;}\
pre{white-space:pre-wrap;}\
mark.q0{background:#ffe066;}mark.q1{background:#8ce99a;}mark.q2{background:#74c0fc;}\
mark.q3{background:#ffa8a8;}mark.q4{background:#d0bfff;}mark.q5{background:#ffc078;}";
const PALETTE_SIZE: usize = 6;

#[derive(Clone, Debug)]
pub struct HighlightQuery {
	pub label: String,
	pub terms: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct HtmlHighlighter;
impl HtmlHighlighter {
	pub fn new() -> Self {
		Self
	}

	pub fn render(
		&self,
		title: &str,
		relative_path: &str,
		fields: &BTreeMap<String, String>,
		queries: &[HighlightQuery],
	) -> String {
		// First query claiming a term owns its colour.
		let mut owners = HashMap::new();

		for (idx, query) in queries.iter().enumerate() {
			for term in &query.terms {
				owners.entry(term.to_lowercase()).or_insert(idx % PALETTE_SIZE);
			}
		}

		let mut out = String::new();

		out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
		out.push_str(&escape_html(title));
		out.push_str("</title>\n<style>");
		out.push_str(STYLE);
		out.push_str("</style>\n</head>\n<body>\n<h1>");
		out.push_str(&escape_html(title));
		out.push_str("</h1>\n<p>");
		out.push_str(&escape_html(relative_path));
		out.push_str("</p>\n");

		if !queries.is_empty() {
			out.push_str("<ul class=\"legend\">\n");

			for (idx, query) in queries.iter().enumerate() {
				out.push_str(&format!(
					"<li><mark class=\"q{}\">{}</mark></li>\n",
					idx % PALETTE_SIZE,
					escape_html(&query.label)
				));
			}

			out.push_str("</ul>\n");
		}

		for (name, text) in fields {
			out.push_str("<h2>");
			out.push_str(&escape_html(name));
			out.push_str("</h2>\n<pre>");
			out.push_str(&mark_terms(text, &owners));
			out.push_str("</pre>\n");
		}

		out.push_str("</body>\n</html>\n");

		out
	}
}

fn mark_terms(text: &str, owners: &HashMap<String, usize>) -> String {
	let mut out = String::with_capacity(text.len());

	for segment in text.split_word_bounds() {
		match owners.get(&segment.to_lowercase()) {
			Some(class) => {
				out.push_str(&format!("<mark class=\"q{class}\">{}</mark>", escape_html(segment)));
			},
			None => out.push_str(&escape_html(segment)),
		}
	}

	out
}

pub fn escape_html(text: &str) -> String {
	let mut out = String::with_capacity(text.len());

	for ch in text.chars() {
		match ch {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(ch),
		}
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn marks_terms_with_first_owning_query() {
		let fields = BTreeMap::from([("body".to_string(), "Lease & lease <renewal>".to_string())]);
		let queries = vec![
			HighlightQuery { label: "Leases".to_string(), terms: vec!["lease".to_string()] },
			HighlightQuery {
				label: "Renewals".to_string(),
				terms: vec!["renewal".to_string(), "lease".to_string()],
			},
		];
		let html = HtmlHighlighter::new().render("a.txt", "docs/a.txt", &fields, &queries);

		assert!(html.contains("<mark class=\"q0\">Lease</mark> &amp; <mark class=\"q0\">lease</mark>"));
		assert!(html.contains("&lt;<mark class=\"q1\">renewal</mark>&gt;"));
		assert!(html.contains("<li><mark class=\"q1\">Renewals</mark></li>"));
	}

	#[test]
	fn escapes_titles() {
		let html = HtmlHighlighter::new().render("<x>", "p", &BTreeMap::new(), &[]);

		assert!(html.contains("<title>&lt;x&gt;</title>"));
		assert!(!html.contains("legend"));
	}
}
