//! Shared helpers for adapter page scraping.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::AdapterError;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Parses a configured base URL, tagging failures with the adapter name.
///
/// # Errors
///
/// Returns [`AdapterError::InvalidUrl`] when `value` is not an absolute URL.
pub fn parse_base_url(source_name: &str, value: &str) -> Result<Url, AdapterError> {
    Url::parse(value).map_err(|_| AdapterError::invalid_url(source_name, value))
}

/// Builds `{base}{path}?{params}` with form-encoded parameters.
///
/// # Errors
///
/// Returns [`AdapterError::InvalidUrl`] when the joined URL cannot be parsed.
pub fn lookup_url(
    source_name: &str,
    base_url: &str,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Url, AdapterError> {
    let joined = format!("{}{path}", base_url.trim_end_matches('/'));
    let parsed = if params.is_empty() {
        Url::parse(&joined)
    } else {
        Url::parse_with_params(&joined, params)
    };
    parsed.map_err(|_| AdapterError::invalid_url(source_name, joined))
}

/// Strips markup from an HTML fragment and collapses whitespace.
#[must_use]
pub fn inner_text(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    decode_entities(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes the handful of HTML entities vendors put in links and labels.
#[must_use]
pub fn decode_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Returns the value of `attribute` inside a single start tag, if present.
#[must_use]
pub fn attribute_value(tag: &str, attribute: &str) -> Option<String> {
    let pattern = format!(r#"(?is)\b{}\s*=\s*["']([^"']*)["']"#, regex::escape(attribute));
    Regex::new(&pattern)
        .ok()?
        .captures(tag)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_absolutize_url_variants() {
        let base = Url::parse("https://www.example.com/search/").unwrap();
        assert_eq!(
            absolutize_url("https://cdn.example.com/a.pdf", &base).as_deref(),
            Some("https://cdn.example.com/a.pdf")
        );
        assert_eq!(
            absolutize_url("//cdn.example.com/a.pdf", &base).as_deref(),
            Some("https://cdn.example.com/a.pdf")
        );
        assert_eq!(
            absolutize_url("/msds/a.pdf", &base).as_deref(),
            Some("https://www.example.com/msds/a.pdf")
        );
    }

    #[test]
    fn test_lookup_url_encodes_params() {
        let url = lookup_url("vwr", "http://127.0.0.1:9000/", "/store/msds", &[("keyword", "67-64-1")])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/store/msds?keyword=67-64-1");
    }

    #[test]
    fn test_inner_text_strips_tags_and_entities() {
        assert_eq!(
            inner_text("<td>\n  <span>Thermo&nbsp;Fisher</span> &amp; Co </td>"),
            "Thermo Fisher & Co"
        );
    }

    #[test]
    fn test_attribute_value_reads_quoted_values() {
        let tag = r#"<div class="prductlist" data-casno="67-64-1" data-id='A0054'>"#;
        assert_eq!(attribute_value(tag, "data-casno").as_deref(), Some("67-64-1"));
        assert_eq!(attribute_value(tag, "data-id").as_deref(), Some("A0054"));
        assert_eq!(attribute_value(tag, "href"), None);
    }
}
