pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<canary_storage::Error> for Error {
	fn from(err: canary_storage::Error) -> Self {
		match err {
			canary_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			canary_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			canary_storage::Error::NotFound(message) => Self::NotFound { message },
			canary_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}
