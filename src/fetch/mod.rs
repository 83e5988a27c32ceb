//! Document retrieval: the per-identifier adapter fallback, the batch
//! worker pool, and the outcome types they report.
//!
//! # Architecture
//!
//! - [`DocumentClient`] - GETs a resolved URL and checks the PDF header
//! - [`FetchOrchestrator`] - store check, ordered adapter fallback, batch pool
//! - [`FetchOutcome`] / [`FetchAttempt`] - per-identifier and per-adapter results
//! - [`FetchError`] / [`BatchError`] - per-attempt failures and batch rejection

mod client;
mod error;
mod orchestrator;
mod outcome;

pub use client::{DocumentClient, MAX_DOCUMENT_BYTES, PDF_MAGIC};
pub use error::{BatchError, FetchError, FetchErrorKind};
pub use orchestrator::FetchOrchestrator;
pub use outcome::{FetchAttempt, FetchOutcome, FetchStatus, NO_SOURCE_SUCCEEDED};
