//! Config-defined sources whose document URL is a fixed template.

use std::time::Duration;

use async_trait::async_trait;

use crate::identifier::ChemicalIdentifier;

use super::utils::parse_base_url;
use super::{AdapterError, ResolvedUrl, SourceAdapter};

/// Placeholder replaced by the percent-encoded identifier.
pub const CAS_PLACEHOLDER: &str = "{cas}";

/// Maps an identifier straight into a URL template; no lookup request.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    name: String,
    url_template: String,
    timeout: Duration,
}

impl TemplateSource {
    /// Creates a template source.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidUrl`] when the template lacks the
    /// `{cas}` placeholder or does not form an absolute URL.
    pub fn new(name: &str, url_template: &str, timeout: Duration) -> Result<Self, AdapterError> {
        if !url_template.contains(CAS_PLACEHOLDER) {
            return Err(AdapterError::invalid_url(name, url_template));
        }
        parse_base_url(name, &url_template.replace(CAS_PLACEHOLDER, "0-00-0"))?;
        Ok(Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl SourceAdapter for TemplateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError> {
        let encoded = urlencoding::encode(identifier.as_str());
        Ok(Some(ResolvedUrl::new(
            self.url_template.replace(CAS_PLACEHOLDER, &encoded),
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_substitutes_identifier() {
        let source = TemplateSource::new(
            "mirror",
            "https://mirror.example.com/sds/{cas}.pdf",
            Duration::from_secs(5),
        )
        .unwrap();
        let id = ChemicalIdentifier::parse("67-64-1").unwrap();
        let resolved = source.resolve(&id).await.unwrap().unwrap();
        assert_eq!(resolved.url, "https://mirror.example.com/sds/67-64-1.pdf");
        assert_eq!(source.name(), "mirror");
    }

    #[test]
    fn test_template_requires_placeholder_and_absolute_url() {
        assert!(TemplateSource::new("a", "https://x.example.com/static.pdf", Duration::ZERO).is_err());
        assert!(TemplateSource::new("b", "not a url {cas}", Duration::ZERO).is_err());
    }
}
