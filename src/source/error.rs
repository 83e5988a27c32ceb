//! Error types for source adapters.
//!
//! Adapter errors never abort the fallback chain: the orchestrator logs them
//! and moves on to the next adapter, exactly as it does for a miss.

use thiserror::Error;

/// Errors that can occur while an adapter looks up a document URL.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The lookup request failed at the transport level (DNS, TLS, timeout).
    #[error("{source_name}: request to {url} failed: {source}")]
    Transport {
        /// Adapter that issued the request.
        source_name: String,
        /// The lookup URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The source answered, but not in a shape the adapter understands.
    #[error("{source_name}: unexpected response from {url}: {reason}")]
    UnexpectedResponse {
        /// Adapter that issued the request.
        source_name: String,
        /// The lookup URL.
        url: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// A configured base URL or URL template could not be used.
    #[error("{source_name}: invalid URL '{url}'")]
    InvalidUrl {
        /// Adapter being configured.
        source_name: String,
        /// The rejected URL.
        url: String,
    },

    /// The adapter's HTTP client could not be constructed.
    #[error("{source_name}: HTTP client construction failed: {reason}")]
    Client {
        /// Adapter being configured.
        source_name: String,
        /// Builder failure description.
        reason: String,
    },
}

impl AdapterError {
    /// Creates a transport error.
    pub fn transport(source_name: &str, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            source_name: source_name.to_string(),
            url: url.into(),
            source,
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected(source_name: &str, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            source_name: source_name.to_string(),
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(source_name: &str, url: impl Into<String>) -> Self {
        Self::InvalidUrl {
            source_name: source_name.to_string(),
            url: url.into(),
        }
    }

    /// Creates a client-construction error.
    pub fn client(source_name: &str, reason: impl Into<String>) -> Self {
        Self::Client {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
