//! Per-identifier fallback and the bounded batch worker pool.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::config::POOL_SIZE_RANGE;
use crate::extract::HazardPipeline;
use crate::identifier::ChemicalIdentifier;
use crate::source::{ResolvedUrl, SourceAdapter, SourceSet};
use crate::store::{ContentStore, StoreError};
use crate::summary::{BatchAggregator, BatchSummary};

use super::client::DocumentClient;
use super::error::{BatchError, FetchError};
use super::outcome::{FetchAttempt, FetchOutcome, NO_SOURCE_SUCCEEDED};

/// Drives adapters, the document client and the content store.
///
/// # Concurrency Model
///
/// - Each identifier of a batch runs in its own Tokio task
/// - A semaphore permit bounds the number of identifiers in flight
/// - Workers share only the content store (single writer) and the
///   aggregator (behind a mutex)
/// - A panicked worker is reported as a failed outcome, never dropped
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    sources: Arc<SourceSet>,
    client: DocumentClient,
    store: ContentStore,
    pipeline: Option<HazardPipeline>,
}

impl FetchOrchestrator {
    /// Creates an orchestrator without hazard extraction.
    #[must_use]
    pub fn new(sources: SourceSet, client: DocumentClient, store: ContentStore) -> Self {
        Self {
            sources: Arc::new(sources),
            client,
            store,
            pipeline: None,
        }
    }

    /// Runs `pipeline` on every newly stored document.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: HazardPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// The configured adapters.
    #[must_use]
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// The content store documents are written to.
    #[must_use]
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Produces the terminal outcome for one identifier.
    ///
    /// A stored identifier short-circuits with no network calls. Otherwise
    /// adapters are tried in priority order until one yields a valid PDF.
    /// Adapter and transport failures move on to the next adapter; a
    /// storage failure ends the identifier as failed.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub async fn fetch_one(&self, identifier: &ChemicalIdentifier) -> FetchOutcome {
        match self.store.lookup(identifier).await {
            Ok(Some(document)) => {
                debug!(source = %document.source_name, "already stored");
                return FetchOutcome::already_exists(
                    identifier.clone(),
                    Some(document.source_name),
                    Some(document.file_path),
                );
            }
            Ok(None) => {}
            Err(error) => {
                warn!(error = %error, "store lookup failed");
                return FetchOutcome::failed(
                    identifier.clone(),
                    FetchError::Persistence(error).to_string(),
                    Vec::new(),
                );
            }
        }

        let mut attempts = Vec::new();
        for adapter in self.sources.iter() {
            let name = adapter.name();
            let resolved = match resolve_within_budget(adapter, identifier).await {
                Ok(resolved) => resolved,
                Err(error) => {
                    debug!(source = name, kind = ?error.kind(), error = %error, "adapter missed");
                    attempts.push(attempt(identifier, name, Some(&error), None));
                    continue;
                }
            };
            let provider = resolved.provider.clone();

            let bytes = match self.client.fetch(&resolved.url, adapter.timeout()).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    info!(
                        source = name,
                        url = %resolved.url,
                        kind = ?error.kind(),
                        error = %error,
                        "document fetch failed; trying next source"
                    );
                    attempts.push(attempt(identifier, name, Some(&error), provider));
                    continue;
                }
            };

            return match self.store.write(identifier, &bytes, name).await {
                Ok(document) => {
                    info!(
                        source = name,
                        provider = provider.as_deref().unwrap_or("unknown"),
                        bytes = bytes.len(),
                        "document stored"
                    );
                    attempts.push(attempt(identifier, name, None, provider));
                    self.extract_hazards(identifier, bytes).await;
                    FetchOutcome::downloaded(
                        identifier.clone(),
                        name.to_string(),
                        document.file_path,
                        attempts,
                    )
                }
                Err(StoreError::AlreadyStored { .. }) => {
                    debug!("stored concurrently by another worker");
                    self.already_stored(identifier).await
                }
                Err(error) => {
                    let error = FetchError::Persistence(error);
                    warn!(source = name, error = %error, "could not store document");
                    attempts.push(attempt(identifier, name, Some(&error), provider));
                    FetchOutcome::failed(identifier.clone(), error.to_string(), attempts)
                }
            };
        }

        info!(attempts = attempts.len(), "no source succeeded");
        FetchOutcome::failed(identifier.clone(), NO_SOURCE_SUCCEEDED, attempts)
    }

    /// Fetches a batch with at most `pool_size` identifiers in flight.
    ///
    /// Repeated identifiers are processed once. The summary lists every
    /// distinct identifier exactly once, in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] for an empty list or a pool size outside
    /// `1..=100`, before any work starts.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn fetch_batch(
        &self,
        identifiers: &[ChemicalIdentifier],
        pool_size: usize,
    ) -> Result<BatchSummary, BatchError> {
        validate_batch(identifiers, pool_size)?;
        let requested = distinct(identifiers);
        let started = Instant::now();

        let semaphore = Arc::new(Semaphore::new(pool_size));
        let aggregator = Arc::new(Mutex::new(BatchAggregator::new(requested.clone())));
        let mut handles = Vec::with_capacity(requested.len());

        for identifier in requested {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!("worker pool closed; remaining identifiers reported as failed");
                break;
            };
            let orchestrator = self.clone();
            let aggregator = Arc::clone(&aggregator);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = orchestrator.fetch_one(&identifier).await;
                aggregator.lock().await.record(outcome);
            }));
        }

        for handle in handles {
            if let Err(error) = handle.await {
                warn!(error = %error, "fetch worker panicked");
            }
        }

        // Every worker has finished, so the lock is uncontended.
        let aggregator = std::mem::replace(
            &mut *aggregator.lock().await,
            BatchAggregator::new(Vec::new()),
        );
        let summary = aggregator.finish();
        info!(
            total = summary.total,
            downloaded = summary.downloaded,
            already_exists = summary.already_exists,
            failed = summary.failed,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "batch complete"
        );
        Ok(summary)
    }

    /// Runs a large list as consecutive batches of `chunk_size` and merges
    /// the summaries. `on_chunk` receives `(processed, total)` after each
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] for an empty list, a zero chunk size or an
    /// invalid pool size.
    pub async fn fetch_in_chunks<F>(
        &self,
        identifiers: &[ChemicalIdentifier],
        pool_size: usize,
        chunk_size: usize,
        mut on_chunk: F,
    ) -> Result<BatchSummary, BatchError>
    where
        F: FnMut(usize, usize),
    {
        validate_batch(identifiers, pool_size)?;
        if chunk_size == 0 {
            return Err(BatchError::InvalidChunkSize { value: chunk_size });
        }

        let requested = distinct(identifiers);
        let total = requested.len();
        let mut merged = BatchSummary::default();
        let mut processed = 0;
        for chunk in requested.chunks(chunk_size) {
            merged.merge(self.fetch_batch(chunk, pool_size).await?);
            processed += chunk.len();
            on_chunk(processed, total);
        }
        Ok(merged)
    }

    async fn already_stored(&self, identifier: &ChemicalIdentifier) -> FetchOutcome {
        match self.store.lookup(identifier).await {
            Ok(document) => FetchOutcome::already_exists(
                identifier.clone(),
                document.as_ref().map(|d| d.source_name.clone()),
                document.map(|d| d.file_path),
            ),
            Err(error) => FetchOutcome::failed(
                identifier.clone(),
                FetchError::Persistence(error).to_string(),
                Vec::new(),
            ),
        }
    }

    async fn extract_hazards(&self, identifier: &ChemicalIdentifier, bytes: Vec<u8>) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        match pipeline.run(identifier, bytes).await {
            Ok(record) => debug!(
                method = record.extraction_method.as_str(),
                statements = record.hazard_statements.len(),
                "hazard record stored"
            ),
            Err(error) => warn!(error = %error, "hazard extraction failed; document kept"),
        }
    }
}

async fn resolve_within_budget(
    adapter: &dyn SourceAdapter,
    identifier: &ChemicalIdentifier,
) -> Result<ResolvedUrl, FetchError> {
    let budget = adapter.timeout();
    match tokio::time::timeout(budget, adapter.resolve(identifier)).await {
        Ok(Ok(Some(resolved))) => Ok(resolved),
        Ok(Ok(None)) => Err(FetchError::ResolutionMiss {
            source_name: adapter.name().to_string(),
        }),
        Ok(Err(error)) => Err(FetchError::Lookup(error)),
        Err(_) => Err(FetchError::LookupTimeout {
            source_name: adapter.name().to_string(),
            secs: budget.as_secs(),
        }),
    }
}

fn attempt(
    identifier: &ChemicalIdentifier,
    adapter_name: &str,
    error: Option<&FetchError>,
    provider: Option<String>,
) -> FetchAttempt {
    FetchAttempt {
        identifier: identifier.clone(),
        adapter_name: adapter_name.to_string(),
        succeeded: error.is_none(),
        error_reason: error.map(ToString::to_string),
        error_kind: error.map(FetchError::kind),
        provider,
    }
}

fn validate_batch(identifiers: &[ChemicalIdentifier], pool_size: usize) -> Result<(), BatchError> {
    if identifiers.is_empty() {
        return Err(BatchError::EmptyBatch);
    }
    if !POOL_SIZE_RANGE.contains(&pool_size) {
        return Err(BatchError::InvalidPoolSize { value: pool_size });
    }
    Ok(())
}

fn distinct(identifiers: &[ChemicalIdentifier]) -> Vec<ChemicalIdentifier> {
    let mut seen = HashSet::with_capacity(identifiers.len());
    identifiers
        .iter()
        .filter(|identifier| seen.insert(identifier.as_str()))
        .cloned()
        .collect()
}
