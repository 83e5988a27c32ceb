//! SDS Finder Core Library
//!
//! Acquires chemical Safety Data Sheets from several external sources,
//! stores each exactly once, and extracts GHS hazard data from them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`source`] - Source adapters resolving an identifier to a document URL
//! - [`fetch`] - Adapter fallback, document download and the batch worker pool
//! - [`store`] - Content-addressed document store with checksum deduplication
//! - [`summary`] - Batch outcome aggregation
//! - [`extract`] - Two-stage hazard extraction and hazard record persistence
//! - [`nfpa`] - GHS category to NFPA classification rules
//! - [`service`] - Facade exposing the engine's operations
//! - [`config`] - Settings from file and environment
//! - [`db`] - Database connection and schema management

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod extract;
pub mod fetch;
pub mod identifier;
pub mod nfpa;
pub mod service;
pub mod source;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use config::{ConfigError, Settings};
pub use db::{Database, DbError};
pub use extract::{ExtractionMethod, HazardExtractor, HazardRecord, SignalWord};
pub use fetch::{BatchError, DocumentClient, FetchOrchestrator, FetchOutcome, FetchStatus};
pub use identifier::{ChemicalIdentifier, IdentifierError};
pub use nfpa::{NfpaClassification, RuleTable, TemperatureScale};
pub use service::{BatchFetchRequest, DocumentStatus, SdsService, ServiceError};
pub use source::{ResolvedUrl, SourceAdapter, SourceSet};
pub use store::{ContentStore, StoreError, StoredDocument};
pub use summary::{BatchDetail, BatchSummary};
