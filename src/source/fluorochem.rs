//! Fluorochem molecule search. The SDS link in the first hit is a path on
//! the separate document host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, send_lookup};
use super::utils::{lookup_url, parse_base_url};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_SEARCH_BASE_URL: &str = "https://dougdiscovery.com";
const DEFAULT_DOCUMENT_BASE_URL: &str = "https://7128445.app.netsuite.com";
const SEARCH_PATH: &str = "/api/v1/molecules/search";
const PAGE_LIMIT: u32 = 12;
const PROVIDER: &str = "Fluorochem";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    molecule: Molecule,
}

#[derive(Debug, Deserialize)]
struct Molecule {
    sds: Option<SdsLinks>,
}

#[derive(Debug, Deserialize)]
struct SdsLinks {
    custrecord_sdslink_en: Option<String>,
}

/// Queries the Fluorochem catalog search API.
pub struct FluorochemSource {
    client: Client,
    search_base_url: String,
    document_base_url: String,
    timeout: Duration,
}

impl FluorochemSource {
    /// Adapter name.
    pub const NAME: &'static str = "fluorochem";

    /// Creates the adapter against the public endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when HTTP client construction fails.
    pub fn new(timeout: Duration) -> Result<Self, AdapterError> {
        Self::with_base_urls(DEFAULT_SEARCH_BASE_URL, DEFAULT_DOCUMENT_BASE_URL, timeout)
    }

    /// Creates the adapter with custom search and document hosts (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when a base URL is invalid or client
    /// construction fails.
    pub fn with_base_urls(
        search_base_url: impl Into<String>,
        document_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let search_base_url = search_base_url.into();
        let document_base_url = document_base_url.into();
        parse_base_url(Self::NAME, &search_base_url)?;
        parse_base_url(Self::NAME, &document_base_url)?;
        Ok(Self {
            client: build_http_client(Self::NAME, timeout, false)?,
            search_base_url,
            document_base_url: document_base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

impl std::fmt::Debug for FluorochemSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluorochemSource")
            .field("search_base_url", &self.search_base_url)
            .field("document_base_url", &self.document_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for FluorochemSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "fluorochem", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let search_url = lookup_url(Self::NAME, &self.search_base_url, SEARCH_PATH, &[])?;
        let body = json!({ "q": identifier.as_str(), "offset": 0, "limit": PAGE_LIMIT });

        let request = self.client.post(search_url.clone()).json(&body);
        let Some(response) = send_lookup(Self::NAME, request, search_url.as_str()).await? else {
            return Ok(None);
        };
        let parsed: SearchResponse = response.json().await.map_err(|e| {
            AdapterError::unexpected(Self::NAME, search_url.as_str(), e.to_string())
        })?;

        Ok(first_sds_path(parsed).map(|sds_path| {
            ResolvedUrl::new(format!("{}{sds_path}", self.document_base_url))
                .with_provider(PROVIDER)
        }))
    }
}

fn first_sds_path(response: SearchResponse) -> Option<String> {
    response
        .data
        .into_iter()
        .next()?
        .molecule
        .sds?
        .custrecord_sdslink_en
        .filter(|link| !link.trim().is_empty())
}
