//! Source adapters that map a chemical identifier to an SDS download URL.
//!
//! # Architecture
//!
//! - [`SourceAdapter`] - Async trait that individual sources implement
//! - [`SourceSet`] - Ordered collection of adapters; order is priority
//! - [`ResolvedUrl`] - A candidate document URL plus the provider that published it
//! - [`build_source_set`] - Builds the configured set from [`Settings`]
//!
//! Adapters never fail for ordinary absence of data: "no match" is
//! `Ok(None)`. Errors are reserved for transport faults and unreadable
//! responses, and callers treat them exactly like a miss.

mod chemblink;
mod chemicalsafety;
mod error;
mod fisher;
mod fluorochem;
pub mod http_client;
mod tci;
mod template;
mod utils;
mod vwr;

pub use chemblink::ChemblinkSource;
pub use chemicalsafety::ChemicalSafetySource;
pub use error::AdapterError;
pub use fisher::FisherSource;
pub use fluorochem::FluorochemSource;
pub use tci::TciSource;
pub use template::TemplateSource;
pub use vwr::VwrSource;

pub(crate) use utils::compile_static_regex;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::config::Settings;
use crate::identifier::ChemicalIdentifier;

/// Names of the built-in adapters, in default priority order.
pub const BUILTIN_SOURCES: [&str; 6] = [
    ChemblinkSource::NAME,
    VwrSource::NAME,
    FisherSource::NAME,
    TciSource::NAME,
    ChemicalSafetySource::NAME,
    FluorochemSource::NAME,
];

/// A candidate document URL produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// The document URL to GET.
    pub url: String,
    /// Manufacturer or distributor that published the sheet, when the source says.
    pub provider: Option<String>,
}

impl ResolvedUrl {
    /// Creates a resolved URL with no provider.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            provider: None,
        }
    }

    /// Attaches provider metadata.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        self.provider = (!provider.trim().is_empty()).then(|| provider.trim().to_string());
        self
    }
}

/// Trait that all SDS sources implement.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Box<dyn SourceAdapter>`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the adapter's name, used for provenance.
    fn name(&self) -> &str;

    /// Time budget for this adapter's lookup and for the document GET.
    fn timeout(&self) -> Duration;

    /// Looks up a document URL for `identifier`.
    ///
    /// Returns `Ok(None)` when the source has no sheet for the identifier.
    async fn resolve(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<ResolvedUrl>, AdapterError>;
}

/// Ordered set of source adapters. The first adapter that yields a
/// retrievable document wins.
#[derive(Default)]
pub struct SourceSet {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl SourceSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an adapter at the lowest priority.
    pub fn push(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Returns this set without the adapter called `name`.
    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.adapters.retain(|adapter| adapter.name() != name);
        self
    }

    /// Adapter names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }

    /// Name and timeout of each adapter, in priority order.
    #[must_use]
    pub fn describe(&self) -> Vec<SourceInfo> {
        self.adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| SourceInfo {
                priority: index + 1,
                name: adapter.name().to_string(),
                timeout_secs: adapter.timeout().as_secs(),
            })
            .collect()
    }

    /// Iterates adapters in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn SourceAdapter> {
        self.adapters.iter().map(AsRef::as_ref)
    }

    /// Number of adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true if no adapters are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSet")
            .field("adapters", &self.names())
            .finish()
    }
}

/// One row of the `sources` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    /// 1-based priority.
    pub priority: usize,
    /// Adapter name.
    pub name: String,
    /// Per-source timeout in seconds.
    pub timeout_secs: u64,
}

/// Builds the source set described by `settings`.
///
/// Order follows `settings.source_order`; each adapter's timeout is its
/// `source_timeouts` entry or the global fetch timeout. Adapters that fail
/// to construct are skipped with a warning so the remaining sources stay
/// usable.
#[must_use]
pub fn build_source_set(settings: &Settings) -> SourceSet {
    let mut set = SourceSet::new();
    for name in &settings.source_order {
        let timeout = settings.timeout_for(name);
        match build_adapter(name, timeout, settings) {
            Ok(Some(adapter)) => set.push(adapter),
            Ok(None) => warn!(source = %name, "unknown source name; skipping"),
            Err(error) => warn!(
                source = %name,
                error = %error,
                "source unavailable; continuing with remaining sources"
            ),
        }
    }
    set
}

fn build_adapter(
    name: &str,
    timeout: Duration,
    settings: &Settings,
) -> Result<Option<Box<dyn SourceAdapter>>, AdapterError> {
    let adapter: Box<dyn SourceAdapter> = match name {
        ChemblinkSource::NAME => Box::new(ChemblinkSource::new(timeout)?),
        VwrSource::NAME => Box::new(VwrSource::new(timeout)?),
        FisherSource::NAME => Box::new(FisherSource::new(timeout)?),
        TciSource::NAME => Box::new(TciSource::new(timeout)?),
        ChemicalSafetySource::NAME => Box::new(ChemicalSafetySource::new(timeout)?),
        FluorochemSource::NAME => Box::new(FluorochemSource::new(timeout)?),
        other => {
            let Some(custom) = settings.custom_sources.iter().find(|c| c.name == other) else {
                return Ok(None);
            };
            Box::new(TemplateSource::new(&custom.name, &custom.url_template, timeout)?)
        }
    };
    Ok(Some(adapter))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CustomSource;

    struct Fixed(&'static str);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(3)
        }

        async fn resolve(
            &self,
            _identifier: &ChemicalIdentifier,
        ) -> Result<Option<ResolvedUrl>, AdapterError> {
            Ok(None)
        }
    }

    #[test]
    fn test_source_set_preserves_push_order() {
        let mut set = SourceSet::new();
        set.push(Box::new(Fixed("b")));
        set.push(Box::new(Fixed("a")));
        set.push(Box::new(Fixed("c")));
        assert_eq!(set.names(), ["b", "a", "c"]);
    }

    #[test]
    fn test_source_set_without_removes_only_named_adapter() {
        let mut set = SourceSet::new();
        set.push(Box::new(Fixed("first")));
        set.push(Box::new(Fixed("second")));
        let set = set.without("first");
        assert_eq!(set.names(), ["second"]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_resolved_url_blank_provider_is_dropped() {
        let resolved = ResolvedUrl::new("https://x/y.pdf").with_provider("  ");
        assert_eq!(resolved.provider, None);
        let resolved = ResolvedUrl::new("https://x/y.pdf").with_provider(" Sigma ");
        assert_eq!(resolved.provider.as_deref(), Some("Sigma"));
    }

    #[test]
    fn test_build_source_set_default_order() {
        let set = build_source_set(&Settings::default());
        assert_eq!(set.names(), BUILTIN_SOURCES);
    }

    #[test]
    fn test_build_source_set_applies_order_timeouts_and_custom_sources() {
        let mut settings = Settings::default();
        settings.custom_sources.push(CustomSource {
            name: "mirror".to_string(),
            url_template: "https://mirror.example.com/sds/{cas}.pdf".to_string(),
        });
        settings.source_order = vec!["mirror".to_string(), "tci".to_string()];
        settings.source_timeouts.insert("tci".to_string(), 7);

        let set = build_source_set(&settings);
        let described = set.describe();

        assert_eq!(set.names(), ["mirror", "tci"]);
        assert_eq!(described[0].timeout_secs, settings.fetch_timeout_secs);
        assert_eq!(described[1].timeout_secs, 7);
        assert_eq!(described[1].priority, 2);
    }
}
