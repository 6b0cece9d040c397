use graphsearch_core::Error as CoreError;
use thiserror::Error;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Graph not configured: {0}")]
    UnknownGraph(String),

    #[error("Failed to read graph table {path}: {message}")]
    TableUnreadable { path: String, message: String },
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnknownGraph(_) | StorageError::TableUnreadable { .. } => {
                CoreError::data_unavailable(err.to_string())
            }
            StorageError::ConnectionFailed(_)
            | StorageError::QueryFailed(_)
            | StorageError::MigrationFailed(_) => CoreError::cache_unavailable(err.to_string()),
        }
    }
}
