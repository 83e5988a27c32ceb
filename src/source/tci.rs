//! TCI Chemicals: a two-request lookup in one cookie session.
//!
//! The search page carries a CSRF token, the site's context path and the
//! product list. The SDS document endpoint answers a form POST for the first
//! product with a `Content-Disposition` naming the PDF under
//! `{context}/sds/`.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, REFERER};
use tracing::debug;

use crate::identifier::ChemicalIdentifier;

use super::http_client::{build_http_client, fetch_lookup_text, send_lookup};
use super::utils::{attribute_value, compile_static_regex, lookup_url, parse_base_url};
use super::{AdapterError, ResolvedUrl, SourceAdapter};

const DEFAULT_BASE_URL: &str = "https://www.tcichemicals.com";
const SEARCH_PATH: &str = "/US/en/search/";
const DOCUMENT_PATH: &str = "/US/en/documentSearch/productSDSSearchDoc";
const PROVIDER: &str = "TCI";

static INPUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<input\s[^>]*>"));
static CONTEXT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"encodedContextPath[^;]+?'(\S+)';"));
static PRODUCT_DIV_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<div\s[^>]*class\s*=\s*["'][^"']*\bprductlist\b[^>]*>"#)
});
static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"filename=(\S+)$"));

/// Looks up TCI product SDS documents.
pub struct TciSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TciSource {
    /// Adapter name.
    pub const NAME: &'static str = "tci";

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
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn request_file_name(
        &self,
        product_code: &str,
        csrf_token: &str,
        referer: &str,
    ) -> Result<Option<String>, AdapterError> {
        let document_url = format!("{}{DOCUMENT_PATH}", self.base_url);
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("productCode", product_code)
            .append_pair("langSelector", "en")
            .append_pair("selectedCountry", "US")
            .append_pair("CSRFToken", csrf_token)
            .finish();
        let request = self
            .client
            .post(&document_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(REFERER, referer)
            .body(form);

        let Some(response) = send_lookup(Self::NAME, request, &document_url).await? else {
            return Ok(None);
        };
        Ok(response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_disposition))
    }
}

impl std::fmt::Debug for TciSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TciSource")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for TciSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(skip(self), fields(source = "tci", identifier = %identifier))]
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let search_url = lookup_url(
            Self::NAME,
            &self.base_url,
            SEARCH_PATH,
            &[("text", identifier.as_str())],
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

        let Some(csrf_token) = csrf_token(&html) else {
            debug!("search page carried no CSRF token");
            return Ok(None);
        };
        let Some(context_path) = context_path(&html) else {
            return Err(AdapterError::unexpected(
                Self::NAME,
                search_url.as_str(),
                "encodedContextPath not found on search page",
            ));
        };
        let Some(product_code) = first_product_code(&html, identifier.as_str()) else {
            return Ok(None);
        };

        let referer = format!("{}{SEARCH_PATH}", self.base_url);
        let Some(file_name) = self
            .request_file_name(&product_code, &csrf_token, &referer)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(
            ResolvedUrl::new(format!("{}{context_path}/sds/{file_name}", self.base_url))
                .with_provider(PROVIDER),
        ))
    }
}

fn csrf_token(html: &str) -> Option<String> {
    INPUT_TAG_RE.find_iter(html).find_map(|tag| {
        let tag = tag.as_str();
        (attribute_value(tag, "name").as_deref() == Some("CSRFToken"))
            .then(|| attribute_value(tag, "value"))
            .flatten()
            .filter(|value| !value.is_empty())
    })
}

fn context_path(html: &str) -> Option<String> {
    CONTEXT_PATH_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace('\\', ""))
}

/// Product code of the first hit, only if that hit is the requested CAS.
fn first_product_code(html: &str, cas: &str) -> Option<String> {
    let first = PRODUCT_DIV_RE.find(html)?.as_str();
    if attribute_value(first, "data-casno").as_deref() != Some(cas) {
        return None;
    }
    attribute_value(first, "data-id").filter(|id| !id.is_empty())
}

fn file_name_from_disposition(header: &str) -> Option<String> {
    let raw = FILENAME_RE.captures(header.trim())?.get(1)?.as_str();
    let unquoted = raw.trim_matches('"').trim_end_matches(';');
    let decoded = urlencoding::decode(unquoted)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| unquoted.to_string());
    Some(decoded).filter(|name| !name.is_empty() && !name.contains('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PAGE: &str = r#"<html><head><script>
        ACC.config.encodedContextPath = '\/US\/en';
        </script></head><body>
        <form><input type="hidden" name="CSRFToken" value="tok-123"></form>
        <div id="contentSearchFacet"><span class="facet__text"><a>Products</a><span class="facet__value__count">(1)</span></span></div>
        <div class="prductlist" data-casno="67-64-1" data-id="A0054">Acetone</div>
        </body></html>"#;

    #[test]
    fn test_search_page_fields() {
        assert_eq!(csrf_token(SEARCH_PAGE).as_deref(), Some("tok-123"));
        assert_eq!(context_path(SEARCH_PAGE).as_deref(), Some("/US/en"));
        assert_eq!(first_product_code(SEARCH_PAGE, "67-64-1").as_deref(), Some("A0054"));
        assert_eq!(first_product_code(SEARCH_PAGE, "64-17-5"), None);
    }

    #[test]
    fn test_file_name_from_disposition() {
        assert_eq!(
            file_name_from_disposition("attachment; filename=A0054_US_EN.pdf").as_deref(),
            Some("A0054_US_EN.pdf")
        );
        assert_eq!(
            file_name_from_disposition("attachment; filename=\"A0054_US_EN.pdf\"").as_deref(),
            Some("A0054_US_EN.pdf")
        );
        assert_eq!(file_name_from_disposition("inline"), None);
    }

    #[tokio::test]
    async fn test_resolve_posts_product_code_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/US/en/search/"))
            .and(query_param("text", "67-64-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/US/en/documentSearch/productSDSSearchDoc"))
            .and(body_string_contains("productCode=A0054"))
            .and(body_string_contains("CSRFToken=tok-123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=A0054_US_EN.pdf"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = TciSource::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let id = ChemicalIdentifier::parse("67-64-1").unwrap();
        let resolved = source.resolve(&id).await.unwrap().unwrap();

        assert_eq!(resolved.url, format!("{}/US/en/sds/A0054_US_EN.pdf", server.uri()));
        assert_eq!(resolved.provider.as_deref(), Some("TCI"));
    }

    #[tokio::test]
    async fn test_resolve_first_hit_with_other_cas_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/US/en/search/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
            .mount(&server)
            .await;

        let source = TciSource::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let id = ChemicalIdentifier::parse("64-17-5").unwrap();
        assert_eq!(source.resolve(&id).await.unwrap(), None);
    }
}
