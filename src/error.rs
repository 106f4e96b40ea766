use thiserror::Error;

/// All possible errors in the database layer
#[derive(Error, Debug)]
pub enum DbError {
    #[error("could not establish connection: {0}")]
    Connection(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("expected {expected} SQL parameters, got {actual}")]
    ParameterMismatch { expected: usize, actual: usize },

    #[error("scalar query returned {0} columns, expected exactly one")]
    MultiColumns(usize),

    #[error("database context is already initialized on this thread")]
    AlreadyInitialized,

    #[error("database context is not initialized on this thread")]
    NotInitialized,

    #[error("database engine is already configured")]
    AlreadyConfigured,

    #[error("database engine is not configured")]
    NotConfigured,
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Driver(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DbError>;
