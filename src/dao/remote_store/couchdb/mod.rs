//! CouchDB backend over its HTTP API.

mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchRemoteStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::ConflictExhausted { path, attempts } => StorageError::Conflict {
                message: format!("`{path}` still conflicting after {attempts} attempts"),
            },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
