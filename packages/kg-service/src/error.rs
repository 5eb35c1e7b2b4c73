pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	Validation,
	InvalidCursor,
	Store,
}
impl ErrorKind {
	/// Stable machine-readable name used in error envelopes.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "validation_error",
			Self::InvalidCursor => "invalid_cursor",
			Self::Store => "store_error",
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Validation error: {message}")]
	Validation { message: String },
	#[error("Invalid cursor: {message}")]
	InvalidCursor { message: String },
	#[error("Store error: {message}")]
	Store { message: String },
}
impl Error {
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation { .. } => ErrorKind::Validation,
			Self::InvalidCursor { .. } => ErrorKind::InvalidCursor,
			Self::Store { .. } => ErrorKind::Store,
		}
	}

	pub fn message(&self) -> &str {
		match self {
			Self::Validation { message }
			| Self::InvalidCursor { message }
			| Self::Store { message } => message,
		}
	}
}

impl From<kg_domain::Error> for Error {
	fn from(err: kg_domain::Error) -> Self {
		match err {
			kg_domain::Error::Validation { message } => Self::Validation { message },
			kg_domain::Error::InvalidCursor { message } => Self::InvalidCursor { message },
		}
	}
}

impl From<kg_storage::Error> for Error {
	fn from(err: kg_storage::Error) -> Self {
		match err {
			kg_storage::Error::Sqlx(inner) => Self::Store { message: inner.to_string() },
			kg_storage::Error::InvalidArgument(message) => Self::Store { message },
			kg_storage::Error::Qdrant(inner) => Self::Store { message: inner.to_string() },
		}
	}
}
