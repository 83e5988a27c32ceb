//! Fisher Scientific SDS search.
//!
//! The results page lists one row per compound: an image cell whose
//! structure image is named after the CAS number, followed by a catalog
//! cell of SDS links. Only a row whose image mentions the requested CAS
//! counts, since Fisher silently widens searches to near matches.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, fetch_lookup_text};
use super::utils::{absolutize_url, attribute_value, compile_static_regex, lookup_url, parse_base_url};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://www.fishersci.com";
const SEARCH_PATH: &str = "/us/en/catalog/search/sds";
const PROVIDER: &str = "Fisher";

static IMAGE_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)class\s*=\s*["'][^"']*\bmsds_img\b[^"']*["']"#)
});
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<img\s[^>]*>"));
static ANCHOR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<a\s[^>]*>"));

/// Searches Fisher Scientific's SDS catalog.
pub struct FisherSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FisherSource {
    /// Adapter name.
    pub const NAME: &'static str = "fisher";

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
            client: build_http_client(Self::NAME, timeout, false)?,
            base_url,
            timeout,
        })
    }
}

impl std::fmt::Debug for FisherSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FisherSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for FisherSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "fisher", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let search_url = lookup_url(
            Self::NAME,
            &self.base_url,
            SEARCH_PATH,
            &[
                ("selectLang", ""),
                ("store", ""),
                ("msdsKeyword", identifier.as_str()),
            ],
        )?;
        let request = self
            .client
            .get(search_url.clone())
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "same-origin");
        let Some(html) = fetch_lookup_text(Self::NAME, request, search_url.as_str()).await? else {
            return Ok(None);
        };

        Ok(matching_row_href(&html, identifier.as_str())
            .and_then(|href| absolutize_url(&href, &search_url))
            .map(|url| ResolvedUrl::new(url).with_provider(PROVIDER)))
    }
}

/// Returns the first catalog link of the row whose image names `cas`.
fn matching_row_href(html: &str, cas: &str) -> Option<String> {
    let starts: Vec<usize> = IMAGE_CELL_RE.find_iter(html).map(|m| m.start()).collect();
    for (index, start) in starts.iter().enumerate() {
        let end = starts.get(index + 1).copied().unwrap_or(html.len());
        let row = &html[*start..end];
        let Some(data_at) = row.find("catalog_data") else {
            continue;
        };
        let (image_part, data_part) = row.split_at(data_at);

        let names_cas = IMG_TAG_RE.find_iter(image_part).any(|img| {
            attribute_value(img.as_str(), "src").is_some_and(|src| src.contains(cas))
        });
        if !names_cas {
            continue;
        }

        let Some(items_at) = data_part.find("catlog_items") else {
            continue;
        };
        let href = ANCHOR_TAG_RE
            .find(&data_part[items_at..])
            .and_then(|anchor| attribute_value(anchor.as_str(), "href"))
            .filter(|href| !href.is_empty());
        if href.is_some() {
            return href;
        }
    }
    None
}
