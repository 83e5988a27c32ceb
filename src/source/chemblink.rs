//! ChemBlink MSDS pages: one static page per CAS number with a
//! "View / download" link to the vendor PDF.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, fetch_lookup_text};
use super::utils::{absolutize_url, compile_static_regex, inner_text, parse_base_url};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://www.chemblink.com";
const LINK_TEXT: &str = "view / download";

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
});
static PROVIDER_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"([a-zA-Z\-]+)\.pdf"));

/// Scrapes `{base}/MSDS/{cas}MSDS.htm`.
pub struct ChemblinkSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ChemblinkSource {
    /// Adapter name.
    pub const NAME: &'static str = "chemblink";

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
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

impl std::fmt::Debug for ChemblinkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChemblinkSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for ChemblinkSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "chemblink", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let page_url = format!("{}/MSDS/{}MSDS.htm", self.base_url, identifier);
        let Some(html) =
            fetch_lookup_text(Self::NAME, self.client.get(&page_url), &page_url).await?
        else {
            return Ok(None);
        };

        let base = parse_base_url(Self::NAME, &page_url)?;
        Ok(extract_download_link(&html).and_then(|href| {
            let url = absolutize_url(&href, &base)?;
            let resolved = ResolvedUrl::new(url);
            Some(match provider_from_href(&href) {
                Some(provider) => resolved.with_provider(provider),
                None => resolved,
            })
        }))
    }
}

fn extract_download_link(html: &str) -> Option<String> {
    ANCHOR_RE.captures_iter(html).find_map(|caps| {
        let text = inner_text(caps.get(2)?.as_str());
        text.eq_ignore_ascii_case(LINK_TEXT)
            .then(|| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .flatten()
    })
}

fn provider_from_href(href: &str) -> Option<String> {
    PROVIDER_RE
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches('-').to_string())
        .filter(|provider| !provider.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><body>
        <a href="/MSDS/67-64-1MSDS.htm">Acetone</a>
        <a class="btn" href="/MSDS/MSDSFiles/67-64-1_Sigma-Aldrich.pdf"> View / download </a>
        </body></html>"#;

    #[test]
    fn test_extract_download_link_matches_link_text() {
        assert_eq!(
            extract_download_link(PAGE).as_deref(),
            Some("/MSDS/MSDSFiles/67-64-1_Sigma-Aldrich.pdf")
        );
        assert_eq!(extract_download_link("<a href=\"/x.pdf\">Other</a>"), None);
    }

    #[test]
    fn test_provider_from_href() {
        assert_eq!(
            provider_from_href("/MSDS/MSDSFiles/67-64-1_Sigma-Aldrich.pdf").as_deref(),
            Some("Sigma-Aldrich")
        );
        assert_eq!(provider_from_href("/MSDS/file"), None);
    }

    #[tokio::test]
    async fn test_resolve_builds_absolute_url_with_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/MSDS/67-64-1MSDS.htm"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let source = ChemblinkSource::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let id = ChemicalIdentifier::parse("67-64-1").unwrap();
        let resolved = source.resolve(&id).await.unwrap().unwrap();

        assert_eq!(
            resolved.url,
            format!("{}/MSDS/MSDSFiles/67-64-1_Sigma-Aldrich.pdf", server.uri())
        );
        assert_eq!(resolved.provider.as_deref(), Some("Sigma-Aldrich"));
    }

    #[tokio::test]
    async fn test_resolve_missing_page_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = ChemblinkSource::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let id = ChemicalIdentifier::parse("0-00-0").unwrap();
        assert_eq!(source.resolve(&id).await.unwrap(), None);
    }
}
