//! Persistence for hazard records.
//!
//! Lists are stored as JSON arrays. A record is replaced wholesale: the old
//! row is deleted and the new one inserted in one transaction, so a failed
//! insert leaves the previous record intact.

use tracing::{debug, instrument};

use crate::db::Database;
use crate::identifier::ChemicalIdentifier;

use super::error::ExtractError;
use super::record::{ExtractionMethod, HazardRecord, SignalWord};

/// Reads and replaces hazard records.
#[derive(Debug, Clone)]
pub struct HazardRepository {
    db: Database,
}

#[derive(Debug, sqlx::FromRow)]
struct HazardRow {
    identifier: String,
    signal_word: Option<String>,
    hazard_statements: String,
    precautionary_statements: String,
    pictograms: String,
    hazard_classes: String,
    extraction_method: String,
}

impl TryFrom<HazardRow> for HazardRecord {
    type Error = ExtractError;

    fn try_from(row: HazardRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| ExtractError::invalid_record(&row.identifier, reason);
        let list = |column: &str| -> Result<Vec<String>, ExtractError> {
            serde_json::from_str(column).map_err(|e| invalid(e.to_string()))
        };

        Ok(Self {
            identifier: ChemicalIdentifier::parse(&row.identifier)
                .map_err(|e| invalid(e.to_string()))?,
            signal_word: row
                .signal_word
                .as_deref()
                .map(str::parse::<SignalWord>)
                .transpose()
                .map_err(invalid)?,
            hazard_statements: list(&row.hazard_statements)?,
            precautionary_statements: list(&row.precautionary_statements)?,
            pictograms: list(&row.pictograms)?,
            hazard_classes: list(&row.hazard_classes)?,
            extraction_method: row
                .extraction_method
                .parse::<ExtractionMethod>()
                .map_err(invalid)?,
        })
    }
}

impl HazardRepository {
    /// Creates a repository over `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replaces the record for `record.identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Persistence`] if the transaction fails; the
    /// previous record, if any, is then unchanged.
    #[instrument(skip(self, record), fields(identifier = %record.identifier, method = record.extraction_method.as_str()))]
    pub async fn replace(&self, record: &HazardRecord) -> Result<(), ExtractError> {
        let encode = |values: &[String]| serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string());
        let _writer = self.db.writer().await;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM hazard_records WHERE identifier = ?")
            .bind(record.identifier.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO hazard_records \
             (identifier, signal_word, hazard_statements, precautionary_statements, \
              pictograms, hazard_classes, extraction_method) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.identifier.as_str())
        .bind(record.signal_word.map(SignalWord::as_str))
        .bind(encode(&record.hazard_statements))
        .bind(encode(&record.precautionary_statements))
        .bind(encode(&record.pictograms))
        .bind(encode(&record.hazard_classes))
        .bind(record.extraction_method.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(statements = record.hazard_statements.len(), "hazard record replaced");
        Ok(())
    }

    /// Returns the current record for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] if the query fails or the row is invalid.
    pub async fn get(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<HazardRecord>, ExtractError> {
        let row: Option<HazardRow> = sqlx::query_as(
            "SELECT identifier, signal_word, hazard_statements, precautionary_statements, \
             pictograms, hazard_classes, extraction_method \
             FROM hazard_records WHERE identifier = ?",
        )
        .bind(identifier.as_str())
        .fetch_optional(self.db.pool())
        .await?;
        row.map(HazardRecord::try_from).transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::StructuredHazards;

    fn record(codes: &[&str], method: ExtractionMethod) -> HazardRecord {
        HazardRecord::new(
            ChemicalIdentifier::parse("67-64-1").unwrap(),
            StructuredHazards {
                signal_word: Some(SignalWord::Danger),
                hazard_statements: codes.iter().map(ToString::to_string).collect(),
                hazard_classes: vec!["Flammable liquids 2".to_string()],
                ..StructuredHazards::default()
            },
            method,
        )
    }

    #[tokio::test]
    async fn test_replace_then_get_round_trips_lists() {
        let repo = HazardRepository::new(Database::new_in_memory().await.unwrap());
        let original = record(&["H225", "H319"], ExtractionMethod::Structured);

        repo.replace(&original).await.unwrap();

        let stored = repo.get(&original.identifier).await.unwrap().unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_replace_keeps_only_latest_record() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = HazardRepository::new(db.clone());

        repo.replace(&record(&["H225"], ExtractionMethod::Structured))
            .await
            .unwrap();
        repo.replace(&record(&["H315"], ExtractionMethod::RegexFallback))
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hazard_records")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let stored = repo
            .get(&ChemicalIdentifier::parse("67-64-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count.0, 1);
        assert_eq!(stored.hazard_statements, ["H315"]);
        assert_eq!(stored.extraction_method, ExtractionMethod::RegexFallback);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let repo = HazardRepository::new(Database::new_in_memory().await.unwrap());
        let missing = repo
            .get(&ChemicalIdentifier::parse("7732-18-5").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
