pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("{operation} has already been invoked on this instance.")]
	AlreadyExecuted { operation: &'static str },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Storage error: {0}")]
	Storage(#[from] rtag_storage::Error),
	#[error("Report error: {message}")]
	Report { message: String },
	#[error("Render error: {message}")]
	Render { message: String },
	#[error("Worker error: {message}")]
	Worker { message: String },
}
impl From<rust_xlsxwriter::XlsxError> for Error {
	fn from(err: rust_xlsxwriter::XlsxError) -> Self {
		Self::Report { message: err.to_string() }
	}
}

impl From<rtag_providers::Error> for Error {
	fn from(err: rtag_providers::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::Worker { message: err.to_string() }
	}
}
