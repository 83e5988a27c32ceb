//! Error types for hazard extraction.

use thiserror::Error;

use crate::store::StoreError;

/// Errors raised while extracting or persisting hazard records.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The structured parser could not interpret the document.
    #[error("structured parse failed: {reason}")]
    Parse {
        /// What the parser rejected.
        reason: String,
    },

    /// The document's text layer could not be read.
    #[error("text extraction failed: {reason}")]
    Text {
        /// Underlying failure.
        reason: String,
    },

    /// The document could not be loaded from the content store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reading or replacing the hazard record failed.
    #[error("hazard record persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// A stored hazard record could not be decoded.
    #[error("invalid hazard record for {identifier}: {reason}")]
    InvalidRecord {
        /// Identifier column of the row.
        identifier: String,
        /// What was wrong.
        reason: String,
    },

    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExtractError {
    /// Creates a stage-one parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    /// Creates a text extraction error.
    pub fn text(reason: impl Into<String>) -> Self {
        Self::Text {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-record error.
    pub fn invalid_record(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}
