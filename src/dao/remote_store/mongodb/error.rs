use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result alias for MongoDB store operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the missing variable.
        var: &'static str,
    },
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Building the client from the parsed options failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Number of pings attempted.
        attempts: u32,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Creating a required index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Looking up an event by join code failed.
    #[error("failed to look up event by code `{code}`")]
    FindEvent {
        /// Join code that was looked up.
        code: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Inserting an event failed.
    #[error("failed to save event `{id}`")]
    SaveEvent {
        /// Document identifier.
        id: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// Upserting a station failed.
    #[error("failed to save station `{id}`")]
    SaveStation {
        /// Document identifier.
        id: String,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
    /// The `$inc` upsert on a score document failed.
    #[error("failed to increment score of player {player_id} in event `{event_id}`")]
    IncrementScore {
        /// Event the score belongs to.
        event_id: String,
        /// Player whose score was being raised.
        player_id: u32,
        /// Underlying error.
        #[source]
        source: MongoError,
    },
}
