//! Document GET with the success rule: status 200, no redirect, PDF bytes.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::source::http_client::build_http_client;

use super::error::FetchError;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Largest document accepted, in bytes.
pub const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Ceiling for the client itself; each request sets its own budget.
const CLIENT_TIMEOUT_SECS: u64 = 600;

/// HTTP client for document downloads.
///
/// Redirects are never followed, so a redirect arrives here as a 3xx
/// status and fails the attempt.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: Client,
    max_bytes: u64,
}

impl DocumentClient {
    /// Creates a client with the default size cap.
    ///
    /// # Errors
    ///
    /// Returns [`crate::source::AdapterError`] when client construction fails.
    pub fn new() -> Result<Self, crate::source::AdapterError> {
        Ok(Self {
            client: build_http_client("document", Duration::from_secs(CLIENT_TIMEOUT_SECS), false)?,
            max_bytes: MAX_DOCUMENT_BYTES,
        })
    }

    /// Overrides the size cap.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetches `url` within `timeout` and returns the PDF bytes.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] / [`FetchError::Network`] on transport faults
    /// - [`FetchError::Redirected`] for any 3xx answer
    /// - [`FetchError::HttpStatus`] for any other non-200 answer
    /// - [`FetchError::Validation`] when the body is empty, too large or not a PDF
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if status.is_redirection() {
            return Err(FetchError::Redirected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(FetchError::validation(
                url,
                format!("document is {length} bytes; limit is {}", self.max_bytes),
            ));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_bytes {
                return Err(FetchError::validation(
                    url,
                    format!("document exceeds {} bytes", self.max_bytes),
                ));
            }
        }

        if !bytes.starts_with(PDF_MAGIC) {
            return Err(FetchError::validation(url, "response is not a PDF (missing %PDF header)"));
        }
        debug!(bytes = bytes.len(), "document fetched");
        Ok(bytes)
    }
}
