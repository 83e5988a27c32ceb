//! Error types for document fetching and batch submission.

use serde::Serialize;
use thiserror::Error;

use crate::identifier::IdentifierError;
use crate::source::AdapterError;
use crate::store::StoreError;

/// Coarse classification used for fallback decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// The adapter had nothing (or could not look anything up).
    ResolutionMiss,
    /// Network fault, timeout, non-200 status or redirect.
    Transport,
    /// The bytes are not a PDF.
    Validation,
    /// The document could not be stored.
    Persistence,
}

/// Errors for one (identifier, adapter) attempt.
///
/// Everything except [`FetchError::Persistence`] sends the orchestrator on
/// to the next adapter.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The adapter reported no match.
    #[error("{source_name}: no match")]
    ResolutionMiss {
        /// Adapter name.
        source_name: String,
    },

    /// The adapter's lookup failed; treated as a miss.
    #[error("{0}")]
    Lookup(#[source] AdapterError),

    /// The adapter's lookup exceeded its time budget.
    #[error("{source_name}: lookup timed out after {secs}s")]
    LookupTimeout {
        /// Adapter name.
        source_name: String,
        /// Budget in seconds.
        secs: u64,
    },

    /// Network-level failure fetching the document.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// Document URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The document GET exceeded its time budget.
    #[error("timeout fetching {url}")]
    Timeout {
        /// Document URL.
        url: String,
    },

    /// The server answered with a status other than 200.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Document URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The server redirected; usually a login or captcha wall.
    #[error("redirect (HTTP {status}) fetching {url}")]
    Redirected {
        /// Document URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The response body is not a usable PDF.
    #[error("invalid document from {url}: {reason}")]
    Validation {
        /// Document URL.
        url: String,
        /// What was wrong.
        reason: String,
    },

    /// The document could not be persisted.
    #[error("persistence failed: {0}")]
    Persistence(#[source] StoreError),
}

impl FetchError {
    /// Creates a network error, mapping client timeouts to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a validation error.
    pub fn validation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error's class.
    #[must_use]
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::ResolutionMiss { .. } | Self::Lookup(_) | Self::LookupTimeout { .. } => {
                FetchErrorKind::ResolutionMiss
            }
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::Redirected { .. } => FetchErrorKind::Transport,
            Self::Validation { .. } => FetchErrorKind::Validation,
            Self::Persistence(_) => FetchErrorKind::Persistence,
        }
    }
}

/// Errors that reject a batch before any work starts.
#[derive(Debug, Error)]
pub enum BatchError {
    /// No identifiers were submitted.
    #[error("identifier list is empty")]
    EmptyBatch,

    /// Pool size is outside the accepted range.
    #[error("invalid pool size {value}; expected 1..=100")]
    InvalidPoolSize {
        /// The rejected size.
        value: usize,
    },

    /// Chunk size is zero.
    #[error("invalid chunk size {value}; expected at least 1")]
    InvalidChunkSize {
        /// The rejected size.
        value: usize,
    },

    /// An identifier failed validation.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        let miss = FetchError::ResolutionMiss {
            source_name: "vwr".to_string(),
        };
        assert_eq!(miss.kind(), FetchErrorKind::ResolutionMiss);

        let redirect = FetchError::Redirected {
            url: "https://x".to_string(),
            status: 302,
        };
        assert_eq!(redirect.kind(), FetchErrorKind::Transport);
        assert_eq!(redirect.to_string(), "redirect (HTTP 302) fetching https://x");

        let invalid = FetchError::validation("https://x", "missing %PDF header");
        assert_eq!(invalid.kind(), FetchErrorKind::Validation);
    }

    #[test]
    fn test_batch_error_messages() {
        assert_eq!(BatchError::EmptyBatch.to_string(), "identifier list is empty");
        assert_eq!(
            BatchError::InvalidPoolSize { value: 0 }.to_string(),
            "invalid pool size 0; expected 1..=100"
        );
    }
}
