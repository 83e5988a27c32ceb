//! Error types for the content store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while persisting or reading stored documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system failure (create, write, link, read, remove).
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Metadata query or write failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No stored document exists for the identifier.
    #[error("no stored document for {identifier}")]
    NotFound {
        /// The identifier that was looked up.
        identifier: String,
    },

    /// A document is already stored for the identifier.
    #[error("a document is already stored for {identifier}")]
    AlreadyStored {
        /// The identifier being written.
        identifier: String,
    },

    /// The target file exists on disk but has no metadata record.
    #[error("{path} already exists but is not a stored document; remove it to re-fetch")]
    FileConflict {
        /// The conflicting file.
        path: PathBuf,
    },

    /// A metadata row could not be turned back into a document.
    #[error("invalid stored record for {identifier}: {reason}")]
    InvalidRecord {
        /// Identifier column of the row.
        identifier: String,
        /// What was wrong.
        reason: String,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(identifier: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identifier: identifier.to_string(),
        }
    }

    /// Returns true if this error means "nothing stored".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
