//! Section-aware parser for the "Hazards identification" section.
//!
//! SDS documents follow a fixed 16-section layout; section 2 carries the
//! GHS classification, label elements and statements. Restricting scans to
//! that section avoids picking up codes quoted elsewhere (transport,
//! regulatory lists), and classification lines are read in their
//! `Name (Category N)` form.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::source::compile_static_regex;

use super::patterns;
use super::record::StructuredHazards;
use super::{ExtractError, StructuredParser, TextExtractor};

static SECTION_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(?:section\s*)?\b2\s*[.:]?\s*hazards?[\s-]+identification")
});
static SECTION_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(?:section\s*)?\b3\s*[.:]?\s*composition")
});
// Class names never span lines; `[ ]` rather than `\s` keeps them on one.
static CATEGORY_PAREN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"([A-Z][A-Za-z ,\-]*?[a-z])[ ]*\([ ]*Category[ ]*([1-4][AB]?)[ ]*\)")
});
static CATEGORY_SEPARATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"([A-Z][A-Za-z ,\-]*?[a-z])[ ]*[-,][ ]*Category[ ]*([1-4][AB]?)\b")
});

/// Parses section 2 of the document text.
#[derive(Clone)]
pub struct SectionParser {
    text: Arc<dyn TextExtractor>,
}

impl SectionParser {
    /// Creates a parser reading text through `text`.
    #[must_use]
    pub fn new(text: Arc<dyn TextExtractor>) -> Self {
        Self { text }
    }
}

impl std::fmt::Debug for SectionParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionParser").finish_non_exhaustive()
    }
}

impl StructuredParser for SectionParser {
    fn extract_structured(&self, document: &[u8]) -> Result<Option<StructuredHazards>, ExtractError> {
        let text = self.text.extract_text(document)?;
        Ok(parse_hazard_section(&text))
    }
}

/// Parses the hazards-identification section of already extracted text.
/// Returns `None` when the section cannot be located.
#[must_use]
pub fn parse_hazard_section(text: &str) -> Option<StructuredHazards> {
    let raw_section = hazard_section(text)?;

    let mut hazard_classes: Vec<String> = CATEGORY_PAREN_RE
        .captures_iter(raw_section)
        .chain(CATEGORY_SEPARATED_RE.captures_iter(raw_section))
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().trim().trim_end_matches(',');
            let category = caps.get(2)?.as_str();
            Some(format!("{name} {category}"))
        })
        .collect();
    hazard_classes.retain(|class| class.len() > 3);

    let section = patterns::normalize_whitespace(raw_section);
    Some(StructuredHazards {
        signal_word: patterns::signal_word(&section),
        hazard_statements: patterns::hazard_codes(&section),
        precautionary_statements: patterns::precautionary_codes(&section),
        pictograms: patterns::pictograms(&section),
        hazard_classes,
    })
}

fn hazard_section(text: &str) -> Option<&str> {
    // Tables of contents repeat the heading; the last heading is the body.
    let start = SECTION_START_RE.find_iter(text).last()?.end();
    let rest = &text[start..];
    let end = SECTION_END_RE.find(rest).map_or(rest.len(), |m| m.start());
    Some(&rest[..end])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SHEET: &str = "SAFETY DATA SHEET\n\
        SECTION 1: Identification. Acetone. Emergency: call P301 hotline.\n\
        SECTION 2: Hazards identification\n\
        Classification of the substance or mixture\n\
        Flammable liquids (Category 2), H225\n\
        Eye irritation (Category 2A), H319\n\
        Specific target organ toxicity - single exposure, Category 3, H336\n\
        Label elements\n\
        Pictogram GHS02 GHS07\n\
        Signal word Danger\n\
        Hazard statement(s) H225 Highly flammable liquid and vapour.\n\
        Precautionary statement(s) P210 Keep away from heat. P305+P351+P338 IF IN EYES.\n\
        SECTION 3: Composition/information on ingredients\n\
        SECTION 14: Transport. UN1090 H290 listed elsewhere.";

    #[test]
    fn test_parse_reads_only_section_two() {
        let hazards = parse_hazard_section(SHEET).unwrap();

        assert_eq!(hazards.signal_word, Some(crate::extract::SignalWord::Danger));
        assert!(hazards.hazard_statements.contains(&"H225".to_string()));
        assert!(hazards.hazard_statements.contains(&"H336".to_string()));
        assert!(!hazards.hazard_statements.contains(&"H290".to_string()));
        assert!(!hazards.precautionary_statements.contains(&"P301".to_string()));
        assert!(hazards.precautionary_statements.contains(&"P305+P351+P338".to_string()));
        assert_eq!(hazards.pictograms, ["GHS02", "GHS07"]);
    }

    #[test]
    fn test_parse_reads_category_classes() {
        let hazards = parse_hazard_section(SHEET).unwrap();
        assert!(hazards.hazard_classes.contains(&"Flammable liquids 2".to_string()));
        assert!(hazards.hazard_classes.contains(&"Eye irritation 2A".to_string()));
        assert!(
            hazards
                .hazard_classes
                .contains(&"Specific target organ toxicity - single exposure 3".to_string()),
            "{:?}",
            hazards.hazard_classes
        );
        assert!(hazards.hazard_classes.iter().all(|c| !c.contains("Classification")));
    }

    #[test]
    fn test_parse_without_section_heading_is_none() {
        assert_eq!(parse_hazard_section("H225 H319 GHS02"), None);
    }
}
