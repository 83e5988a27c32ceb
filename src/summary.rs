//! Batch result aggregation.
//!
//! Workers report outcomes in completion order; the summary lists them in
//! request order, one entry per requested identifier, whatever order they
//! arrived in.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::fetch::{FetchOutcome, FetchStatus};
use crate::identifier::ChemicalIdentifier;

/// Most error strings carried in a summary.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Error text for an identifier whose worker never reported.
pub const MISSING_OUTCOME: &str = "worker did not report an outcome";

/// One row of [`BatchSummary::details`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDetail {
    /// Requested identifier.
    pub identifier: ChemicalIdentifier,
    /// Terminal status.
    pub status: FetchStatus,
    /// Downloaded or already stored.
    pub success: bool,
    /// Adapter that delivered the document.
    pub source: Option<String>,
    /// Stored file.
    pub file_path: Option<PathBuf>,
    /// Failure description.
    pub error: Option<String>,
}

impl From<FetchOutcome> for BatchDetail {
    fn from(outcome: FetchOutcome) -> Self {
        Self {
            identifier: outcome.identifier,
            status: outcome.status,
            success: outcome.status.is_success(),
            source: outcome.source_name,
            file_path: outcome.storage_path,
            error: outcome.error,
        }
    }
}

/// Result of a batch fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Requested identifiers.
    pub total: usize,
    /// Fetched in this run.
    pub downloaded: usize,
    /// Not delivered.
    pub failed: usize,
    /// Already stored before this run.
    pub already_exists: usize,
    /// One entry per requested identifier, in request order.
    pub details: Vec<BatchDetail>,
    /// `identifier: error` lines, at most [`MAX_REPORTED_ERRORS`].
    pub errors: Vec<String>,
}

impl BatchSummary {
    /// Appends a later sub-batch's summary.
    pub fn merge(&mut self, other: Self) {
        self.total += other.total;
        self.downloaded += other.downloaded;
        self.failed += other.failed;
        self.already_exists += other.already_exists;
        self.details.extend(other.details);
        self.errors.extend(other.errors);
        self.errors.truncate(MAX_REPORTED_ERRORS);
    }
}

/// Collects outcomes for a fixed request list.
#[derive(Debug)]
pub struct BatchAggregator {
    requested: Vec<ChemicalIdentifier>,
    outcomes: HashMap<ChemicalIdentifier, FetchOutcome>,
}

impl BatchAggregator {
    /// Creates an aggregator expecting one outcome per identifier in `requested`.
    #[must_use]
    pub fn new(requested: Vec<ChemicalIdentifier>) -> Self {
        let capacity = requested.len();
        Self {
            requested,
            outcomes: HashMap::with_capacity(capacity),
        }
    }

    /// Records a worker's outcome. Outcomes for identifiers that were not
    /// requested, and repeats, are dropped.
    pub fn record(&mut self, outcome: FetchOutcome) {
        if !self.requested.contains(&outcome.identifier) {
            warn!(identifier = %outcome.identifier, "outcome for unrequested identifier dropped");
            return;
        }
        if self.outcomes.contains_key(&outcome.identifier) {
            warn!(identifier = %outcome.identifier, "duplicate outcome dropped");
            return;
        }
        self.outcomes.insert(outcome.identifier.clone(), outcome);
    }

    /// Number of outcomes recorded so far.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.outcomes.len()
    }

    /// Builds the summary. Identifiers with no recorded outcome are
    /// reported as failed.
    #[must_use]
    pub fn finish(mut self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.requested.len(),
            ..BatchSummary::default()
        };

        for identifier in self.requested {
            let outcome = self.outcomes.remove(&identifier).unwrap_or_else(|| {
                warn!(identifier = %identifier, "no outcome recorded");
                FetchOutcome::failed(identifier, MISSING_OUTCOME, Vec::new())
            });

            match outcome.status {
                FetchStatus::Downloaded => summary.downloaded += 1,
                FetchStatus::AlreadyExists => summary.already_exists += 1,
                FetchStatus::Failed => summary.failed += 1,
            }
            if let Some(error) = &outcome.error
                && summary.errors.len() < MAX_REPORTED_ERRORS
            {
                summary.errors.push(format!("{}: {error}", outcome.identifier));
            }
            summary.details.push(BatchDetail::from(outcome));
        }
        summary
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(value: &str) -> ChemicalIdentifier {
        ChemicalIdentifier::parse(value).unwrap()
    }

    fn downloaded(value: &str) -> FetchOutcome {
        FetchOutcome::downloaded(
            id(value),
            "vwr".to_string(),
            PathBuf::from(format!("/sds/{value}-SDS.pdf")),
            Vec::new(),
        )
    }

    #[test]
    fn test_details_follow_request_order_not_arrival_order() {
        let mut aggregator = BatchAggregator::new(vec![id("1-1-1"), id("2-2-2"), id("3-3-3")]);
        aggregator.record(FetchOutcome::failed(id("3-3-3"), "no source succeeded", Vec::new()));
        aggregator.record(downloaded("1-1-1"));
        aggregator.record(FetchOutcome::already_exists(id("2-2-2"), None, None));

        let summary = aggregator.finish();
        let order: Vec<&str> = summary.details.iter().map(|d| d.identifier.as_str()).collect();

        assert_eq!(order, ["1-1-1", "2-2-2", "3-3-3"]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.already_exists, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, ["3-3-3: no source succeeded"]);
    }

    #[test]
    fn test_missing_outcome_is_reported_failed() {
        let mut aggregator = BatchAggregator::new(vec![id("1-1-1"), id("2-2-2")]);
        aggregator.record(downloaded("1-1-1"));

        let summary = aggregator.finish();
        assert_eq!(summary.details.len(), 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details[1].error.as_deref(), Some(MISSING_OUTCOME));
        assert!(!summary.details[1].success);
    }

    #[test]
    fn test_duplicate_and_foreign_outcomes_are_dropped() {
        let mut aggregator = BatchAggregator::new(vec![id("1-1-1")]);
        aggregator.record(downloaded("1-1-1"));
        aggregator.record(FetchOutcome::failed(id("1-1-1"), "late", Vec::new()));
        aggregator.record(downloaded("9-9-9"));

        assert_eq!(aggregator.recorded(), 1);
        let summary = aggregator.finish();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.downloaded, 1);
    }

    #[test]
    fn test_error_list_is_capped() {
        let ids: Vec<ChemicalIdentifier> = (0..25).map(|n| id(&format!("{n}-00-0"))).collect();
        let mut aggregator = BatchAggregator::new(ids.clone());
        for identifier in ids {
            aggregator.record(FetchOutcome::failed(identifier, "no source succeeded", Vec::new()));
        }

        let summary = aggregator.finish();
        assert_eq!(summary.failed, 25);
        assert_eq!(summary.details.len(), 25);
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS);
    }

    #[test]
    fn test_merge_adds_counts_and_keeps_cap() {
        let mut first = BatchSummary {
            total: 2,
            downloaded: 2,
            errors: vec!["a".to_string(); 8],
            ..BatchSummary::default()
        };
        let second = BatchSummary {
            total: 3,
            failed: 3,
            errors: vec!["b".to_string(); 3],
            ..BatchSummary::default()
        };

        first.merge(second);
        assert_eq!(first.total, 5);
        assert_eq!(first.downloaded, 2);
        assert_eq!(first.failed, 3);
        assert_eq!(first.errors.len(), MAX_REPORTED_ERRORS);
    }
}
