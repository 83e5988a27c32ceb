//! Hazard extraction from stored SDS documents.
//!
//! # Architecture
//!
//! - [`TextExtractor`] - raw text layer of a document
//! - [`StructuredParser`] - section-aware parse into [`StructuredHazards`]
//! - [`HazardExtractor`] - two-stage pipeline: structured first, whole-text
//!   pattern scan when the structured stage fails or finds nothing
//! - [`HazardRepository`] - transactional replace of the persisted record
//! - [`HazardPipeline`] - extractor plus repository, as run after a fetch
//!
//! Stage-one failures are logged and never surface; only a failure to read
//! the text layer at all, or to persist the result, is an error.

mod error;
pub mod patterns;
mod pdf;
mod record;
mod repository;
mod section;

pub use error::ExtractError;
pub use pdf::PdfTextExtractor;
pub use record::{ExtractionMethod, HazardRecord, SignalWord, StructuredHazards};
pub use repository::HazardRepository;
pub use section::{SectionParser, parse_hazard_section};

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::identifier::ChemicalIdentifier;

/// Extracts the raw text layer of a document.
pub trait TextExtractor: Send + Sync {
    /// Returns the document's text.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Text`] when the document cannot be read.
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError>;
}

/// Parses a document into structured hazard fields.
pub trait StructuredParser: Send + Sync {
    /// Returns `Ok(None)` when the document has no recognizable structure.
    ///
    /// # Errors
    ///
    /// Any error is treated by [`HazardExtractor`] as a reason to fall back.
    fn extract_structured(&self, document: &[u8])
    -> Result<Option<StructuredHazards>, ExtractError>;
}

/// Two-stage hazard extractor.
#[derive(Clone)]
pub struct HazardExtractor {
    text: Arc<dyn TextExtractor>,
    structured: Arc<dyn StructuredParser>,
}

impl HazardExtractor {
    /// Creates the default extractor: PDF text layer plus section parser.
    #[must_use]
    pub fn new() -> Self {
        let text: Arc<dyn TextExtractor> = Arc::new(PdfTextExtractor);
        let structured = Arc::new(SectionParser::new(Arc::clone(&text)));
        Self { text, structured }
    }

    /// Creates an extractor from explicit capabilities.
    #[must_use]
    pub fn with_parts(text: Arc<dyn TextExtractor>, structured: Arc<dyn StructuredParser>) -> Self {
        Self { text, structured }
    }

    /// Extracts a normalized hazard record from `document`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Text`] when stage one gave nothing usable and
    /// the text layer for stage two cannot be read.
    #[instrument(skip(self, document), fields(identifier = %identifier, bytes = document.len()))]
    pub fn extract(
        &self,
        identifier: &ChemicalIdentifier,
        document: &[u8],
    ) -> Result<HazardRecord, ExtractError> {
        match self.structured.extract_structured(document) {
            Ok(Some(hazards)) if hazards.is_usable() => {
                debug!("structured parse accepted");
                return Ok(HazardRecord::new(
                    identifier.clone(),
                    hazards,
                    ExtractionMethod::Structured,
                ));
            }
            Ok(_) => debug!("structured parse found no statements or pictograms; falling back"),
            Err(error) => warn!(error = %error, "structured parse failed; falling back"),
        }

        let text = self.text.extract_text(document)?;
        Ok(HazardRecord::new(
            identifier.clone(),
            patterns::scan(&text),
            ExtractionMethod::RegexFallback,
        ))
    }
}

impl Default for HazardExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HazardExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HazardExtractor").finish_non_exhaustive()
    }
}

/// Extraction followed by persistence.
#[derive(Debug, Clone)]
pub struct HazardPipeline {
    extractor: HazardExtractor,
    repository: HazardRepository,
}

impl HazardPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(extractor: HazardExtractor, repository: HazardRepository) -> Self {
        Self {
            extractor,
            repository,
        }
    }

    /// The repository records are written to.
    #[must_use]
    pub fn repository(&self) -> &HazardRepository {
        &self.repository
    }

    /// Extracts `document` off the async runtime and replaces the stored
    /// record for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if extraction or persistence fails; a
    /// persistence failure leaves any prior record in place.
    pub async fn run(
        &self,
        identifier: &ChemicalIdentifier,
        document: Vec<u8>,
    ) -> Result<HazardRecord, ExtractError> {
        let extractor = self.extractor.clone();
        let owned_identifier = identifier.clone();
        let record =
            tokio::task::spawn_blocking(move || extractor.extract(&owned_identifier, &document))
                .await??;
        self.repository.replace(&record).await?;
        Ok(record)
    }
}
