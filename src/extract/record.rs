//! Hazard record types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identifier::ChemicalIdentifier;

/// GHS signal word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalWord {
    /// More severe hazard categories.
    Danger,
    /// Less severe hazard categories.
    Warning,
}

impl SignalWord {
    /// Stored and displayed label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Danger => "Danger",
            Self::Warning => "Warning",
        }
    }
}

impl FromStr for SignalWord {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "danger" => Ok(Self::Danger),
            "warning" => Ok(Self::Warning),
            other => Err(format!("unknown signal word '{other}'")),
        }
    }
}

impl fmt::Display for SignalWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which extraction stage produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Section-aware parse of the hazards-identification section.
    Structured,
    /// Whole-document pattern scan.
    RegexFallback,
}

impl ExtractionMethod {
    /// Stored label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::RegexFallback => "regex_fallback",
        }
    }
}

impl FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "structured" => Ok(Self::Structured),
            "regex_fallback" => Ok(Self::RegexFallback),
            other => Err(format!("unknown extraction method '{other}'")),
        }
    }
}

/// Raw output of a structured parser, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredHazards {
    /// Signal word, if the parser found one.
    pub signal_word: Option<SignalWord>,
    /// H-codes.
    pub hazard_statements: Vec<String>,
    /// P-codes.
    pub precautionary_statements: Vec<String>,
    /// Pictogram codes.
    pub pictograms: Vec<String>,
    /// Hazard class tokens.
    pub hazard_classes: Vec<String>,
}

impl StructuredHazards {
    /// A structured result is usable only if it carries hazard statements
    /// or pictograms.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.hazard_statements.is_empty() || !self.pictograms.is_empty()
    }
}

/// Normalized hazard classification for one identifier.
///
/// Every list is deduplicated and lexically sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardRecord {
    /// Identifier the document belongs to.
    pub identifier: ChemicalIdentifier,
    /// GHS signal word.
    pub signal_word: Option<SignalWord>,
    /// H-codes.
    pub hazard_statements: Vec<String>,
    /// P-codes.
    pub precautionary_statements: Vec<String>,
    /// Pictogram codes (`GHS01`..`GHS09`).
    pub pictograms: Vec<String>,
    /// Free-text hazard class tokens.
    pub hazard_classes: Vec<String>,
    /// Stage that produced the record.
    pub extraction_method: ExtractionMethod,
}

impl HazardRecord {
    /// Builds a normalized record.
    #[must_use]
    pub fn new(
        identifier: ChemicalIdentifier,
        hazards: StructuredHazards,
        extraction_method: ExtractionMethod,
    ) -> Self {
        Self {
            identifier,
            signal_word: hazards.signal_word,
            hazard_statements: ordered_set(hazards.hazard_statements),
            precautionary_statements: ordered_set(hazards.precautionary_statements),
            pictograms: ordered_set(hazards.pictograms),
            hazard_classes: ordered_set(hazards.hazard_classes),
            extraction_method,
        }
    }
}

/// Trims, drops empties, deduplicates and sorts.
pub(crate) fn ordered_set(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lists_are_sorted_and_deduplicated() {
        let record = HazardRecord::new(
            ChemicalIdentifier::parse("67-64-1").unwrap(),
            StructuredHazards {
                signal_word: Some(SignalWord::Danger),
                hazard_statements: vec!["H319".into(), "H225".into(), " H225 ".into()],
                pictograms: vec!["GHS07".into(), "GHS02".into()],
                ..StructuredHazards::default()
            },
            ExtractionMethod::Structured,
        );
        assert_eq!(record.hazard_statements, ["H225", "H319"]);
        assert_eq!(record.pictograms, ["GHS02", "GHS07"]);
        assert!(record.precautionary_statements.is_empty());
    }

    #[test]
    fn test_labels_round_trip() {
        assert_eq!("DANGER".parse::<SignalWord>().unwrap(), SignalWord::Danger);
        assert_eq!(
            "regex_fallback".parse::<ExtractionMethod>().unwrap(),
            ExtractionMethod::RegexFallback
        );
        assert_eq!(
            serde_json::to_string(&ExtractionMethod::RegexFallback).unwrap(),
            "\"regex_fallback\""
        );
    }

    #[test]
    fn test_usable_requires_statements_or_pictograms() {
        let only_signal = StructuredHazards {
            signal_word: Some(SignalWord::Warning),
            ..StructuredHazards::default()
        };
        assert!(!only_signal.is_usable());
    }
}
