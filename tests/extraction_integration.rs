//! Integration tests for hazard extraction and persistence.

use std::sync::Arc;

use sds_core::extract::{
    ExtractError, HazardPipeline, HazardRepository, SectionParser, StructuredHazards,
    StructuredParser, TextExtractor,
};
use sds_core::{ChemicalIdentifier, Database, ExtractionMethod, HazardExtractor, SignalWord};
use tempfile::TempDir;

/// Returns a fixed text layer regardless of the document bytes.
struct FixedText(String);

impl TextExtractor for FixedText {
    fn extract_text(&self, _document: &[u8]) -> Result<String, ExtractError> {
        Ok(self.0.clone())
    }
}

/// Always throws, forcing the pattern-scan stage.
struct ThrowingParser;

impl StructuredParser for ThrowingParser {
    fn extract_structured(
        &self,
        _document: &[u8],
    ) -> Result<Option<StructuredHazards>, ExtractError> {
        Err(ExtractError::parse("unsupported layout"))
    }
}

const ACETONE_TEXT: &str = "SAFETY DATA SHEET\n\
    SECTION 2: Hazards identification\n\
    Flammable liquids (Category 2)\n\
    Eye irritation (Category 2A)\n\
    Pictogram GHS02 GHS07\n\
    Signal word Danger\n\
    H225 Highly flammable liquid and vapour. H319 Causes serious eye irritation.\n\
    P210 Keep away from heat. P305+P351+P338 IF IN EYES.\n\
    SECTION 3: Composition/information on ingredients\n\
    SECTION 15: H290 listed for another substance.";

fn acetone() -> ChemicalIdentifier {
    ChemicalIdentifier::parse("67-64-1").unwrap()
}

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(&temp_dir.path().join("sds.db")).await.unwrap();
    (db, temp_dir)
}

#[tokio::test]
async fn test_throwing_parser_yields_sorted_deduplicated_fallback_record() {
    let (db, _dir) = setup_db().await;
    let extractor = HazardExtractor::with_parts(
        Arc::new(FixedText("Signal word: Warning\nH315, H225, H225.".to_string())),
        Arc::new(ThrowingParser),
    );
    let pipeline = HazardPipeline::new(extractor, HazardRepository::new(db));

    let record = pipeline.run(&acetone(), b"%PDF-1.4".to_vec()).await.unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::RegexFallback);
    assert_eq!(record.hazard_statements, ["H225", "H315"]);
    assert_eq!(record.signal_word, Some(SignalWord::Warning));
}

#[tokio::test]
async fn test_section_parser_is_preferred_when_it_finds_codes() {
    let (db, _dir) = setup_db().await;
    let text: Arc<dyn TextExtractor> = Arc::new(FixedText(ACETONE_TEXT.to_string()));
    let extractor =
        HazardExtractor::with_parts(Arc::clone(&text), Arc::new(SectionParser::new(text)));
    let pipeline = HazardPipeline::new(extractor, HazardRepository::new(db));

    let record = pipeline.run(&acetone(), b"%PDF-1.4".to_vec()).await.unwrap();

    assert_eq!(record.extraction_method, ExtractionMethod::Structured);
    assert_eq!(record.hazard_statements, ["H225", "H319"]);
    assert_eq!(record.precautionary_statements, ["P210", "P305+P351+P338"]);
    assert_eq!(record.pictograms, ["GHS02", "GHS07"]);
    assert_eq!(record.hazard_classes, ["Eye irritation 2A", "Flammable liquids 2"]);
    assert_eq!(record.signal_word, Some(SignalWord::Danger));
}

#[tokio::test]
async fn test_rerun_replaces_previous_record() {
    let (db, _dir) = setup_db().await;
    let repository = HazardRepository::new(db.clone());
    let first = HazardPipeline::new(
        HazardExtractor::with_parts(
            Arc::new(FixedText("H225".to_string())),
            Arc::new(ThrowingParser),
        ),
        repository.clone(),
    );
    let second = HazardPipeline::new(
        HazardExtractor::with_parts(
            Arc::new(FixedText("H302 GHS07".to_string())),
            Arc::new(ThrowingParser),
        ),
        repository.clone(),
    );

    first.run(&acetone(), b"%PDF".to_vec()).await.unwrap();
    second.run(&acetone(), b"%PDF".to_vec()).await.unwrap();

    let stored = repository.get(&acetone()).await.unwrap().unwrap();
    assert_eq!(stored.hazard_statements, ["H302"]);
    assert_eq!(stored.pictograms, ["GHS07"]);
    let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hazard_records")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows.0, 1);
}

#[tokio::test]
async fn test_unreadable_text_layer_is_an_error_and_keeps_prior_record() {
    struct NoText;

    impl TextExtractor for NoText {
        fn extract_text(&self, _document: &[u8]) -> Result<String, ExtractError> {
            Err(ExtractError::text("encrypted document"))
        }
    }

    let (db, _dir) = setup_db().await;
    let repository = HazardRepository::new(db);
    HazardPipeline::new(
        HazardExtractor::with_parts(
            Arc::new(FixedText("H225".to_string())),
            Arc::new(ThrowingParser),
        ),
        repository.clone(),
    )
    .run(&acetone(), b"%PDF".to_vec())
    .await
    .unwrap();

    let failing = HazardPipeline::new(
        HazardExtractor::with_parts(Arc::new(NoText), Arc::new(ThrowingParser)),
        repository.clone(),
    );
    let result = failing.run(&acetone(), b"%PDF".to_vec()).await;

    assert!(matches!(result, Err(ExtractError::Text { .. })));
    let stored = repository.get(&acetone()).await.unwrap().unwrap();
    assert_eq!(stored.hazard_statements, ["H225"]);
}
