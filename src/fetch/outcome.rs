//! Per-attempt and per-identifier fetch results.

use std::path::PathBuf;

use serde::Serialize;

use crate::identifier::ChemicalIdentifier;

use super::error::FetchErrorKind;

/// Error text for an identifier no adapter could deliver.
pub const NO_SOURCE_SUCCEEDED: &str = "no source succeeded";

/// One adapter's try at one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchAttempt {
    /// Identifier being fetched.
    pub identifier: ChemicalIdentifier,
    /// Adapter that was tried.
    pub adapter_name: String,
    /// True if this attempt produced the stored document.
    pub succeeded: bool,
    /// Why the attempt failed, if it did.
    pub error_reason: Option<String>,
    /// Class of the failure, if any.
    pub error_kind: Option<FetchErrorKind>,
    /// Provider reported by the adapter.
    pub provider: Option<String>,
}

/// Terminal status of one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// A document was fetched and stored in this run.
    Downloaded,
    /// A document was already stored; no network calls were made.
    AlreadyExists,
    /// No document could be fetched or stored.
    Failed,
}

impl FetchStatus {
    /// Downloaded or already stored.
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Terminal result for one requested identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    /// Requested identifier.
    pub identifier: ChemicalIdentifier,
    /// Terminal status.
    pub status: FetchStatus,
    /// Adapter that delivered the document.
    pub source_name: Option<String>,
    /// Where the bytes are stored.
    pub storage_path: Option<PathBuf>,
    /// Failure description.
    pub error: Option<String>,
    /// Adapter attempts made, in order. Empty for `already_exists`.
    #[serde(skip)]
    pub attempts: Vec<FetchAttempt>,
}

impl FetchOutcome {
    /// Outcome for an identifier that was already stored.
    #[must_use]
    pub fn already_exists(
        identifier: ChemicalIdentifier,
        source_name: Option<String>,
        storage_path: Option<PathBuf>,
    ) -> Self {
        Self {
            identifier,
            status: FetchStatus::AlreadyExists,
            source_name,
            storage_path,
            error: None,
            attempts: Vec::new(),
        }
    }

    /// Outcome for a document fetched and stored now.
    #[must_use]
    pub fn downloaded(
        identifier: ChemicalIdentifier,
        source_name: String,
        storage_path: PathBuf,
        attempts: Vec<FetchAttempt>,
    ) -> Self {
        Self {
            identifier,
            status: FetchStatus::Downloaded,
            source_name: Some(source_name),
            storage_path: Some(storage_path),
            error: None,
            attempts,
        }
    }

    /// Outcome for an identifier that could not be delivered.
    #[must_use]
    pub fn failed(
        identifier: ChemicalIdentifier,
        error: impl Into<String>,
        attempts: Vec<FetchAttempt>,
    ) -> Self {
        Self {
            identifier,
            status: FetchStatus::Failed,
            source_name: None,
            storage_path: None,
            error: Some(error.into()),
            attempts,
        }
    }
}
