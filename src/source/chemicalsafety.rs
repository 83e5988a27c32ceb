//! ChemicalSafety SDS search API.
//!
//! The API returns a column list and positional rows; several manufacturers
//! may publish a sheet for the same CAS. The last row whose CAS matches and
//! whose reference is a direct PDF link wins, and its manufacturer becomes
//! the provider.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, send_lookup};
use super::utils::{compile_static_regex, lookup_url, parse_base_url};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://chemicalsafety.com";
const SEARCH_PATH: &str = "/sds1/sds_retriever.php";

const CAS_COLUMN: &str = "CAS";
const MANUFACTURER_COLUMN: &str = "MANUFACT";
const URL_COLUMN: &str = "HTTPMSDSREF";

static PDF_URL_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"^http.+\.pdf$"));

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    cols: Vec<Column>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
}

/// Queries the ChemicalSafety search endpoint.
pub struct ChemicalSafetySource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ChemicalSafetySource {
    /// Adapter name.
    pub const NAME: &'static str = "chemicalsafety";

    /// Creates the adapter against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when HTTP client construction fails.
    pub fn new(timeout: Duration) -> Result<Self, AdapterError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    /// Creates the adapter against a custom base URL (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the base URL is invalid or client
    /// construction fails.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AdapterError> {
        let base_url = base_url.into();
        parse_base_url(Self::NAME, &base_url)?;
        Ok(Self {
            client: build_http_client(Self::NAME, timeout, false)?,
            base_url,
            timeout,
        })
    }
}

impl std::fmt::Debug for ChemicalSafetySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChemicalSafetySource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for ChemicalSafetySource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "chemicalsafety", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let search_url = lookup_url(
            Self::NAME,
            &self.base_url,
            SEARCH_PATH,
            &[("action", "search")],
        )?;
        let body = json!({
            "IsContains": "false",
            "IncludeSynonyms": "false",
            "SearchSdsServer": "false",
            "Criteria": [format!("cas|{identifier}")],
            "HostName": "sfs website",
            "Bee": "stevia",
            "Action": "search",
            "SearchUrl": "",
            "ResultColumns": ["revision_date"],
        });

        let request = self.client.post(search_url.clone()).json(&body);
        let Some(response) = send_lookup(Self::NAME, request, search_url.as_str()).await? else {
            return Ok(None);
        };
        let parsed: SearchResponse = response.json().await.map_err(|e| {
            AdapterError::unexpected(Self::NAME, search_url.as_str(), e.to_string())
        })?;

        Ok(pick_document(&parsed, identifier.as_str()))
    }
}

fn pick_document(response: &SearchResponse, cas: &str) -> Option<ResolvedUrl> {
    let index_of = |name: &str| response.cols.iter().position(|col| col.name == name);
    let cas_index = index_of(CAS_COLUMN)?;
    let manufacturer_index = index_of(MANUFACTURER_COLUMN)?;
    let url_index = index_of(URL_COLUMN)?;

    response
        .rows
        .iter()
        .filter_map(|row| {
            let row_cas = row.get(cas_index)?.as_str()?;
            let url = row.get(url_index)?.as_str()?;
            (row_cas == cas && PDF_URL_RE.is_match(url)).then(|| {
                let manufacturer = row
                    .get(manufacturer_index)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                ResolvedUrl::new(url).with_provider(manufacturer)
            })
        })
        .last()
}
