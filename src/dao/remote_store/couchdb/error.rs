//! Error types of the CouchDB remote store.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET against the target database.
    #[error("failed to query CouchDB database `{database}`")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a database creation request.
    #[error("failed to create CouchDB database `{database}`")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected status for a database-level operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status code returned by CouchDB.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request to `{path}`")]
    RequestSend {
        /// Request path relative to the server.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected status for a document endpoint.
    #[error("unexpected CouchDB response status {status} for `{path}`")]
    RequestStatus {
        /// Request path relative to the server.
        path: String,
        /// Status code returned by CouchDB.
        status: StatusCode,
    },
    /// Response payload could not be decoded.
    #[error("failed to decode CouchDB response for `{path}`")]
    DecodeResponse {
        /// Request path relative to the server.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// A listed document did not match the expected model.
    #[error("failed to deserialize CouchDB value for `{path}`")]
    DeserializeValue {
        /// Request path relative to the server.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Optimistic updates kept losing against concurrent writers.
    #[error("document `{path}` still conflicting after {attempts} attempts")]
    ConflictExhausted {
        /// Document path that kept conflicting.
        path: String,
        /// Number of read-modify-write attempts.
        attempts: u32,
    },
}
