use std::error::Error;
use thiserror::Error;

/// Result alias for remote store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by remote store backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable context.
        message: String,
        /// Underlying error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A concurrent writer kept winning an optimistic update.
    #[error("storage conflict: {message}")]
    Conflict {
        /// Human-readable context.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
