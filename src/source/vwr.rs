//! VWR MSDS search: a results table whose SDS and manufacturer cells are
//! tagged with `data-title` attributes.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, fetch_lookup_text};
use super::utils::{
    absolutize_url, attribute_value, compile_static_regex, inner_text, lookup_url, parse_base_url,
};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://us.vwr.com";
const SEARCH_PATH: &str = "/store/msds";

static RESULT_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)(\d+)[^<]*?results\s+were\s+found"));
static SDS_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<td[^>]*\bdata-title\s*=\s*["']SDS["'][^>]*>(.*?)</td>"#)
});
static MANUFACTURER_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<td[^>]*\bdata-title\s*=\s*["']Manufacturer["'][^>]*>(.*?)</td>"#)
});
static ANCHOR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<a\s[^>]*>"));

/// Searches VWR's MSDS index by CAS keyword.
pub struct VwrSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl VwrSource {
    /// Adapter name.
    pub const NAME: &'static str = "vwr";

    /// Creates the adapter against the public site.
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
            client: build_http_client(Self::NAME, timeout, true)?,
            base_url,
            timeout,
        })
    }
}

impl std::fmt::Debug for VwrSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VwrSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for VwrSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "vwr", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let search_url = lookup_url(
            Self::NAME,
            &self.base_url,
            SEARCH_PATH,
            &[("keyword", identifier.as_str())],
        )?;
        let Some(html) = fetch_lookup_text(
            Self::NAME,
            self.client.get(search_url.clone()),
            search_url.as_str(),
        )
        .await?
        else {
            return Ok(None);
        };

        if result_count(&html) == 0 {
            return Ok(None);
        }
        let Some(href) = first_sds_href(&html) else {
            return Ok(None);
        };
        let Some(url) = absolutize_url(&href, &search_url) else {
            return Ok(None);
        };

        let resolved = ResolvedUrl::new(url);
        Ok(Some(match first_manufacturer(&html) {
            Some(manufacturer) => resolved.with_provider(manufacturer),
            None => resolved,
        }))
    }
}

fn result_count(html: &str) -> u64 {
    RESULT_COUNT_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn first_sds_href(html: &str) -> Option<String> {
    let cell = SDS_CELL_RE.captures(html)?.get(1)?.as_str();
    let anchor = ANCHOR_TAG_RE.find(cell)?;
    attribute_value(anchor.as_str(), "href").filter(|href| !href.is_empty())
}

fn first_manufacturer(html: &str) -> Option<String> {
    let cell = MANUFACTURER_CELL_RE.captures(html)?.get(1)?.as_str();
    Some(inner_text(cell)).filter(|text| !text.is_empty())
}
