//! GHS flammability category to NFPA fire-code classification.
//!
//! A [`RuleTable`] maps each GHS category label to an ordered list of
//! rules. Each rule bounds flash point and/or boiling point (degrees
//! Fahrenheit) and carries an output classification. The first rule whose
//! bounds admit the supplied values wins; a missing category or no match
//! yields [`NfpaClassification::not_classified`], which is not an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BUILTIN_RULES: &str = include_str!("ghs_to_nfpa_rules.json");

const NOT_CLASSIFIED: &str = "Not classified";
const NOT_AVAILABLE: &str = "Not available";

/// Errors loading a rule table.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule file could not be read.
    #[error("cannot read NFPA rules {path}: {source}")]
    Read {
        /// Rule file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The rule JSON is malformed.
    #[error("invalid NFPA rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Temperature scale of caller-supplied values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureScale {
    /// Degrees Fahrenheit, the table's scale.
    #[default]
    Fahrenheit,
    /// Degrees Celsius; converted before evaluation.
    Celsius,
}

impl TemperatureScale {
    /// Converts `value` in this scale to Fahrenheit.
    #[must_use]
    pub fn to_fahrenheit(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => value,
            Self::Celsius => value * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Derived NFPA classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfpaClassification {
    /// NFPA 30 liquid class, e.g. `Class IB`.
    pub nfpa_class: String,
    /// NFPA 704 flammability rating, 0 to 4.
    pub nfpa_flammability: u8,
    /// Flammable or combustible liquid.
    pub fire_code_type: String,
    /// Human-readable flash point range.
    pub flash_point_description: String,
    /// Human-readable boiling point range.
    pub boiling_point_description: String,
}

impl NfpaClassification {
    /// The fixed result for unknown categories and unmatched values.
    #[must_use]
    pub fn not_classified() -> Self {
        Self {
            nfpa_class: NOT_CLASSIFIED.to_string(),
            nfpa_flammability: 0,
            fire_code_type: NOT_CLASSIFIED.to_string(),
            flash_point_description: NOT_AVAILABLE.to_string(),
            boiling_point_description: NOT_AVAILABLE.to_string(),
        }
    }

    /// False for the fixed fallback result.
    #[must_use]
    pub fn is_classified(&self) -> bool {
        self.nfpa_class != NOT_CLASSIFIED
    }
}

fn inclusive() -> bool {
    true
}

/// Bounds on one temperature. Absent ends are unconstrained; ends are
/// inclusive unless marked otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    /// Lower end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether `min` itself is admitted.
    #[serde(default = "inclusive")]
    pub min_inclusive: bool,
    /// Whether `max` itself is admitted.
    #[serde(default = "inclusive")]
    pub max_inclusive: bool,
}

impl Bound {
    /// A value the caller did not supply never fails the check.
    #[must_use]
    pub fn admits(&self, value: Option<f64>) -> bool {
        let Some(value) = value else {
            return true;
        };
        let above_min = match self.min {
            Some(min) if self.min_inclusive => value >= min,
            Some(min) => value > min,
            None => true,
        };
        let below_max = match self.max {
            Some(max) if self.max_inclusive => value <= max,
            Some(max) => value < max,
            None => true,
        };
        above_min && below_max
    }
}

/// Constraints of one rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Flash point bounds, Fahrenheit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_point_f: Option<Bound>,
    /// Boiling point bounds, Fahrenheit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boiling_point_f: Option<Bound>,
}

impl Conditions {
    fn admit(&self, flash_point_f: Option<f64>, boiling_point_f: Option<f64>) -> bool {
        self.flash_point_f
            .as_ref()
            .is_none_or(|bound| bound.admits(flash_point_f))
            && self
                .boiling_point_f
                .as_ref()
                .is_none_or(|bound| bound.admits(boiling_point_f))
    }
}

/// A rule: constraints plus the classification they produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Constraints.
    pub rule: Conditions,
    /// Result when the constraints hold.
    pub output: NfpaClassification,
}

/// Category label to ordered rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    ghs_to_nfpa: BTreeMap<String, Vec<Rule>>,
}

impl RuleTable {
    /// The table compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Parse`] if the embedded JSON is malformed.
    pub fn builtin() -> Result<Self, RuleError> {
        Self::from_json(BUILTIN_RULES)
    }

    /// Parses a table from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, RuleError> {
        let json = fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading NFPA rules");
        Self::from_json(&json)
    }

    /// The table at `path`, or the built-in table when no path is configured.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the table cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, RuleError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    /// Known category labels, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.ghs_to_nfpa.keys().map(String::as_str)
    }

    /// Classifies `category` given optional Fahrenheit temperatures.
    ///
    /// A bare category number such as `"2"` is read as `"Category 2"`.
    /// Non-finite temperatures are treated as not supplied.
    #[must_use]
    pub fn evaluate(
        &self,
        category: &str,
        flash_point_f: Option<f64>,
        boiling_point_f: Option<f64>,
    ) -> NfpaClassification {
        let category = category.trim();
        let rules = self.ghs_to_nfpa.get(category).or_else(|| {
            category
                .chars()
                .all(|c| c.is_ascii_digit())
                .then(|| self.ghs_to_nfpa.get(&format!("Category {category}")))
                .flatten()
        });
        let Some(rules) = rules else {
            debug!(category, "category not in rule table");
            return NfpaClassification::not_classified();
        };

        let flash_point_f = flash_point_f.filter(|v| v.is_finite());
        let boiling_point_f = boiling_point_f.filter(|v| v.is_finite());
        rules
            .iter()
            .find(|rule| rule.rule.admit(flash_point_f, boiling_point_f))
            .map_or_else(NfpaClassification::not_classified, |rule| {
                rule.output.clone()
            })
    }

    /// Like [`RuleTable::evaluate`] with temperatures given in `scale`.
    #[must_use]
    pub fn classify(
        &self,
        category: &str,
        flash_point: Option<f64>,
        boiling_point: Option<f64>,
        scale: TemperatureScale,
    ) -> NfpaClassification {
        self.evaluate(
            category,
            flash_point.map(|value| scale.to_fahrenheit(value)),
            boiling_point.map(|value| scale.to_fahrenheit(value)),
        )
    }
}
