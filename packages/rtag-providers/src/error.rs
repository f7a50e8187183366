pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read corpus at {path:?}.")]
	ReadCorpus { path: std::path::PathBuf, source: std::io::Error },
	#[error("Invalid corpus line {line}: {source}")]
	ParseCorpus { line: usize, source: serde_json::Error },
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Unknown document address {0}.")]
	UnknownDocument(u64),
}
