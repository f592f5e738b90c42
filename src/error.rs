//! Error types for recipe-harvest
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (Config, Database, invalid records, etc.)
//! - Process exit code mapping for binaries embedding the pipeline
//!
//! Only errors that abort a run surface here. Field-level extraction failures
//! and unreachable sites are recorded on the affected record instead (see
//! [`crate::failures`] and [`crate::types::RecordStatus`]).

use thiserror::Error;

/// Result type alias for recipe-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for recipe-harvest
///
/// Every variant that reaches a caller is fatal for the current run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "timeout")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error (report directory, database directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A string that should have been a fetchable URL was not
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A record could not be built from the supplied values
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// sysexits(3) codes used by [`ToExitCode`]
pub mod exit_code {
    /// The input data was incorrect in some way
    pub const DATA_ERR: i32 = 65;
    /// An internal software error has been detected
    pub const SOFTWARE: i32 = 70;
    /// An error occurred while doing I/O on some file (or the cache database)
    pub const IO_ERR: i32 = 74;
    /// Something was found in an unconfigured or misconfigured state
    pub const CONFIG: i32 = 78;
}

/// Map errors to process exit codes
///
/// Binaries wrapping the pipeline terminate with [`ToExitCode::exit_code`] so that
/// store and filesystem failures are distinguishable from configuration mistakes.
pub trait ToExitCode {
    /// Get the process exit code for this error
    fn exit_code(&self) -> i32;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            // Store and filesystem failures
            Error::Database(_) => exit_code::IO_ERR,
            Error::Sqlx(_) => exit_code::IO_ERR,
            Error::Io(_) => exit_code::IO_ERR,

            // Rejected before any network activity
            Error::Config { .. } => exit_code::CONFIG,
            Error::Network(_) => exit_code::CONFIG,

            // Bad input data
            Error::InvalidUrl(_) => exit_code::DATA_ERR,
            Error::InvalidRecord(_) => exit_code::DATA_ERR,

            Error::Serialization(_) => exit_code::SOFTWARE,
            Error::Other(_) => exit_code::SOFTWARE,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(e) => match e {
                DatabaseError::ConnectionFailed(_) => "database_unavailable",
                DatabaseError::MigrationFailed(_) => "migration_failed",
                DatabaseError::QueryFailed(_) => "database_error",
            },
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "http_client_error",
            Error::Serialization(_) => "serialization_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidRecord(_) => "invalid_record",
            Error::Other(_) => "internal_error",
        }
    }
}
