//! Facade over the engine: the operations exposed to callers.
//!
//! [`SdsService`] wires settings, the database, the content store, the
//! configured sources and hazard extraction together.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::{ConfigError, Settings};
use crate::db::{Database, DbError};
use crate::extract::{ExtractError, HazardExtractor, HazardPipeline, HazardRecord, HazardRepository};
use crate::fetch::{BatchError, DocumentClient, FetchOrchestrator};
use crate::identifier::{ChemicalIdentifier, IdentifierError, parse_unique};
use crate::source::{AdapterError, SourceInfo, SourceSet, build_source_set};
use crate::store::{ContentStore, StoreError, StoreStats, StoredDocument, ValidationReport};
use crate::summary::BatchSummary;

/// Header names accepted for the identifier column of a CSV import.
const CSV_IDENTIFIER_COLUMNS: [&str; 2] = ["cas#", "cas_number"];

/// Errors surfaced by [`SdsService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Settings are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database could not be opened.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A store operation failed, including "not found".
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch was rejected before any work started.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// An identifier is malformed.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// Hazard extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The document HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] AdapterError),

    /// An import file could not be read.
    #[error("cannot read import file {path}: {source}")]
    ImportRead {
        /// Import file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An import file has no usable identifier column.
    #[error("invalid import file {path}: {reason}")]
    ImportFormat {
        /// Import file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}

impl ServiceError {
    /// Returns true if the error means "nothing stored for that identifier".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(error) => error.is_not_found(),
            Self::Extract(ExtractError::Store(error)) => error.is_not_found(),
            _ => false,
        }
    }
}

/// Batch fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFetchRequest {
    /// Raw identifiers; repeats are processed once.
    pub identifiers: Vec<String>,
    /// Worker pool size; the configured default when absent.
    #[serde(default)]
    pub pool_size: Option<usize>,
}

/// Stored-document metadata returned by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStatus {
    /// Requested identifier.
    pub identifier: ChemicalIdentifier,
    /// `{identifier}-SDS.pdf`, or the owner's name for an alias.
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Source that delivered the bytes.
    pub source: String,
    /// SHA-256 of the bytes.
    pub checksum: String,
    /// Result of [`ContentStore::validate`].
    pub is_valid: bool,
    /// Owner identifier when the bytes are shared.
    pub duplicate_of: Option<ChemicalIdentifier>,
    /// When the document was stored.
    pub retrieved_at: String,
}

/// Engine facade.
#[derive(Debug, Clone)]
pub struct SdsService {
    settings: Settings,
    db: Database,
    orchestrator: FetchOrchestrator,
    pipeline: HazardPipeline,
}

impl SdsService {
    /// Opens the database and content store described by `settings` and
    /// builds the configured sources.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the settings are invalid or any
    /// component cannot be opened.
    #[instrument(skip(settings), fields(db = %settings.database_path.display(), dir = %settings.sds_dir.display()))]
    pub async fn open(settings: Settings) -> Result<Self, ServiceError> {
        settings.validate()?;
        let db = Database::new(&settings.database_path).await?;
        let sources = build_source_set(&settings);
        Self::with_parts(settings, db, sources, DocumentClient::new()?).await
    }

    /// Assembles a service from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the content store cannot be opened.
    pub async fn with_parts(
        settings: Settings,
        db: Database,
        sources: SourceSet,
        client: DocumentClient,
    ) -> Result<Self, ServiceError> {
        let store = ContentStore::open(&settings.sds_dir, db.clone()).await?;
        let pipeline = HazardPipeline::new(HazardExtractor::new(), HazardRepository::new(db.clone()));
        let orchestrator =
            FetchOrchestrator::new(sources, client, store).with_pipeline(pipeline.clone());

        info!(sources = ?orchestrator.sources().names(), "service ready");
        Ok(Self {
            settings,
            db,
            orchestrator,
            pipeline,
        })
    }

    /// Effective settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn store(&self) -> &ContentStore {
        self.orchestrator.store()
    }

    /// Fetches a batch of identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] only for a rejected request: an empty or
    /// malformed identifier list, or an invalid pool size.
    pub async fn batch_fetch(&self, request: BatchFetchRequest) -> Result<BatchSummary, ServiceError> {
        let identifiers = parse_unique(&request.identifiers)?;
        let pool_size = request.pool_size.unwrap_or(self.settings.pool_size);
        Ok(self.orchestrator.fetch_batch(&identifiers, pool_size).await?)
    }

    /// Fetches every identifier listed in `path` in sub-batches.
    ///
    /// `on_chunk` receives `(processed, total)` after each sub-batch.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the file cannot be read or parsed, or
    /// the batch is rejected.
    pub async fn import<F>(
        &self,
        path: &Path,
        pool_size: Option<usize>,
        chunk_size: Option<usize>,
        on_chunk: F,
    ) -> Result<BatchSummary, ServiceError>
    where
        F: FnMut(usize, usize),
    {
        let raw = read_identifier_file(path)?;
        let identifiers = parse_unique(&raw)?;
        info!(path = %path.display(), identifiers = identifiers.len(), "importing identifiers");
        Ok(self
            .orchestrator
            .fetch_in_chunks(
                &identifiers,
                pool_size.unwrap_or(self.settings.pool_size),
                chunk_size.unwrap_or(self.settings.chunk_size),
                on_chunk,
            )
            .await?)
    }

    /// Metadata for a stored document.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`ServiceError`] when nothing is stored.
    pub async fn status(&self, identifier: &str) -> Result<DocumentStatus, ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        let document = self
            .store()
            .lookup(&identifier)
            .await?
            .ok_or_else(|| StoreError::not_found(&identifier))?;
        let report = self.store().validate(&identifier).await?;

        Ok(DocumentStatus {
            file_name: document.file_name(),
            size: document.byte_size,
            source: document.source_name,
            checksum: document.checksum,
            is_valid: report.valid,
            duplicate_of: document.duplicate_of,
            retrieved_at: document.retrieved_at,
            identifier,
        })
    }

    /// Stored bytes and the download file name `{identifier}-SDS.pdf`.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`ServiceError`] when nothing is stored.
    pub async fn read_document(&self, identifier: &str) -> Result<(String, Vec<u8>), ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        let (_, bytes) = self.store().read(&identifier).await?;
        Ok((identifier.document_file_name(), bytes))
    }

    /// Checks the stored file.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`ServiceError`] when nothing is stored.
    pub async fn validate(&self, identifier: &str) -> Result<ValidationReport, ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        Ok(self.store().validate(&identifier).await?)
    }

    /// Runs hazard extraction on the stored document and replaces the
    /// persisted record.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`ServiceError`] when nothing is stored, or the
    /// extraction error.
    pub async fn extract(&self, identifier: &str) -> Result<HazardRecord, ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        let (_, bytes) = self.store().read(&identifier).await?;
        Ok(self.pipeline.run(&identifier, bytes).await?)
    }

    /// The persisted hazard record, if extraction has run.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if the query fails.
    pub async fn hazards(&self, identifier: &str) -> Result<Option<HazardRecord>, ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        Ok(self.pipeline.repository().get(&identifier).await?)
    }

    /// Store statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] if a query fails.
    pub async fn stats(&self) -> Result<StoreStats, ServiceError> {
        Ok(self.store().stats().await?)
    }

    /// Configured sources in priority order.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceInfo> {
        self.orchestrator.sources().describe()
    }

    /// Removes a stored document so it can be fetched again.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`ServiceError`] when nothing is stored.
    pub async fn remove(&self, identifier: &str) -> Result<StoredDocument, ServiceError> {
        let identifier = ChemicalIdentifier::parse(identifier)?;
        Ok(self.store().remove(&identifier).await?)
    }

    /// Closes the database pool.
    pub async fn close(self) {
        self.db.close().await;
    }
}

/// Reads raw identifiers from an import file.
///
/// A file whose first line contains a comma is read as CSV and must have a
/// `Cas#` or `cas_number` header column. Anything else is one identifier
/// per line; blank lines and `#` comments are skipped.
///
/// # Errors
///
/// Returns [`ServiceError::ImportRead`] or [`ServiceError::ImportFormat`].
pub fn read_identifier_file(path: &Path) -> Result<Vec<String>, ServiceError> {
    let content = std::fs::read_to_string(path).map_err(|source| ServiceError::ImportRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .peekable();

    let Some(first) = lines.peek() else {
        return Ok(Vec::new());
    };
    if !first.contains(',') {
        return Ok(lines.map(ToString::to_string).collect());
    }

    let header = lines.next().unwrap_or_default();
    let column = split_csv(header)
        .position(|name| {
            CSV_IDENTIFIER_COLUMNS
                .iter()
                .any(|accepted| name.eq_ignore_ascii_case(accepted))
        })
        .ok_or_else(|| ServiceError::ImportFormat {
            path: path.to_path_buf(),
            reason: "no Cas# or cas_number column in header".to_string(),
        })?;

    Ok(lines
        .filter_map(|line| split_csv(line).nth(column))
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .collect())
}

fn split_csv(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|cell| cell.trim().trim_matches('"').trim())
}
