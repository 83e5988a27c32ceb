//! Chemical identifiers (CAS registry numbers).
//!
//! The engine treats identifiers as opaque keys: they address stored
//! documents and name files on disk, so the only validation applied is the
//! one that keeps them usable as file-name stems.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when validating an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The identifier is empty or whitespace only.
    #[error("empty chemical identifier")]
    Empty,

    /// The identifier contains characters that cannot appear in a file name.
    #[error("identifier '{value}' contains path characters and cannot name a document")]
    PathUnsafe {
        /// The rejected value.
        value: String,
    },
}

/// An externally supplied chemical identifier, normally a CAS number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChemicalIdentifier(String);

impl ChemicalIdentifier {
    /// Parses and trims a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] for blank input and
    /// [`IdentifierError::PathUnsafe`] when the value contains a path
    /// separator, a NUL byte or a `..` sequence.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if value.contains(['/', '\\', '\0']) || value.contains("..") {
            return Err(IdentifierError::PathUnsafe {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the deterministic document file name, `{identifier}-SDS.pdf`.
    #[must_use]
    pub fn document_file_name(&self) -> String {
        format!("{}-SDS.pdf", self.0)
    }
}

impl fmt::Display for ChemicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChemicalIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChemicalIdentifier> for String {
    fn from(value: ChemicalIdentifier) -> Self {
        value.0
    }
}

/// Parses a list of raw identifiers, dropping repeats while keeping the
/// first-seen order.
///
/// # Errors
///
/// Returns the first [`IdentifierError`] encountered; nothing is returned
/// partially.
pub fn parse_unique(raw: &[String]) -> Result<Vec<ChemicalIdentifier>, IdentifierError> {
    let mut seen = std::collections::HashSet::new();
    let mut identifiers = Vec::with_capacity(raw.len());
    for value in raw {
        let identifier = ChemicalIdentifier::parse(value)?;
        if seen.insert(identifier.clone()) {
            identifiers.push(identifier);
        }
    }
    Ok(identifiers)
}
