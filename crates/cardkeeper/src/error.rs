//! Error types for cardkeeper.
//!
//! This module defines all error types used throughout the cardkeeper crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::card::CardId;
use crate::compose::ValidationError;

/// The main error type for cardkeeper operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A storage key contains characters the backend cannot represent.
    #[error("invalid storage key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The background writer is gone, so the write was never performed.
    #[error("persist queue is closed")]
    WriterClosed,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Card Errors ===
    /// A list position outside the current list was addressed.
    #[error("card index {index} is out of range (list has {len} cards)")]
    IndexOutOfRange {
        /// The requested position (0-based).
        index: usize,
        /// The list length at the time of the call.
        len: usize,
    },

    /// No card carries the given id.
    #[error("no card with id {0}")]
    CardNotFound(CardId),

    /// A selector string did not identify exactly one card.
    #[error("cannot select card '{input}': {reason}")]
    Selector {
        /// The raw selector input.
        input: String,
        /// Why it could not be resolved.
        reason: String,
    },

    /// A draft card was rejected by the creation flow.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for cardkeeper operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a selector error.
    #[must_use]
    pub fn selector(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Selector {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by addressing a card that isn't there.
    #[must_use]
    pub fn is_missing_card(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. } | Self::CardNotFound(_) | Self::Selector { .. }
        )
    }

    /// Check if this error is a user-facing validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
