//! Content-addressed document store.
//!
//! Bytes live in one flat directory as `{identifier}-SDS.pdf`; metadata
//! (size, SHA-256 checksum, source, alias link) lives in SQLite. A document
//! whose checksum matches an already stored file is recorded as an alias of
//! that file and no bytes are written.
//!
//! Writes are exclusive at the storage layer: bytes go to a private temp
//! file which is then hard-linked to the final name, and linking fails if
//! the name already exists. A concurrent writer for the same identifier
//! therefore loses cleanly instead of clobbering the file, and a failure
//! part-way leaves no artifact behind.

mod error;
mod validate;

pub use error::StoreError;
pub use validate::ValidationReport;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::db::Database;
use crate::identifier::ChemicalIdentifier;

/// Persisted document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    /// Identifier the document was fetched for.
    pub identifier: ChemicalIdentifier,
    /// File holding the bytes. For aliases this is the owner's file.
    pub file_path: PathBuf,
    /// Size in bytes.
    pub byte_size: u64,
    /// Lowercase hex SHA-256 of the bytes.
    pub checksum: String,
    /// Adapter that produced the bytes.
    pub source_name: String,
    /// Owner identifier when these bytes were first stored under another identifier.
    pub duplicate_of: Option<ChemicalIdentifier>,
    /// UTC timestamp of the write, `YYYY-MM-DD HH:MM:SS`.
    pub retrieved_at: String,
}

impl StoredDocument {
    /// Download file name, always `{identifier}-SDS.pdf` even for aliases.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.identifier.document_file_name()
    }

    /// True if this record reuses another identifier's bytes.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// Aggregate numbers for the `stats` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Stored identifiers, aliases included.
    pub documents: u64,
    /// Distinct files on disk.
    pub unique_files: u64,
    /// Identifiers that share another identifier's bytes.
    pub duplicate_aliases: u64,
    /// Bytes on disk (aliases not counted).
    pub total_bytes: u64,
    /// Identifiers per source name.
    pub by_source: BTreeMap<String, u64>,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    identifier: String,
    file_path: String,
    byte_size: i64,
    checksum: String,
    source_name: String,
    duplicate_of: Option<String>,
    retrieved_at: String,
}

impl TryFrom<DocumentRow> for StoredDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| StoreError::InvalidRecord {
            identifier: row.identifier.clone(),
            reason,
        };
        let identifier =
            ChemicalIdentifier::parse(&row.identifier).map_err(|e| invalid(e.to_string()))?;
        let duplicate_of = row
            .duplicate_of
            .as_deref()
            .map(ChemicalIdentifier::parse)
            .transpose()
            .map_err(|e| invalid(e.to_string()))?;
        let byte_size =
            u64::try_from(row.byte_size).map_err(|_| invalid("negative byte_size".to_string()))?;

        Ok(Self {
            identifier,
            file_path: PathBuf::from(row.file_path),
            byte_size,
            checksum: row.checksum,
            source_name: row.source_name,
            duplicate_of,
            retrieved_at: row.retrieved_at,
        })
    }
}

const SELECT_DOCUMENT: &str = "SELECT identifier, file_path, byte_size, checksum, source_name, \
     duplicate_of, retrieved_at FROM sds_documents";

/// Returns the lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Document store over a directory and the metadata database.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    db: Database,
}

impl ContentStore {
    /// Opens the store, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>, db: Database) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root, db })
    }

    /// Directory holding document files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path for `identifier`'s own file.
    #[must_use]
    pub fn path_for(&self, identifier: &ChemicalIdentifier) -> PathBuf {
        self.root.join(identifier.document_file_name())
    }

    /// Returns true if a document is recorded for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the query fails.
    pub async fn exists(&self, identifier: &ChemicalIdentifier) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sds_documents WHERE identifier = ?")
            .bind(identifier.as_str())
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.is_some())
    }

    /// Returns the stored document for `identifier`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or the row is invalid.
    pub async fn lookup(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!("{SELECT_DOCUMENT} WHERE identifier = ?"))
            .bind(identifier.as_str())
            .fetch_optional(self.db.pool())
            .await?;
        row.map(StoredDocument::try_from).transpose()
    }

    /// Persists `bytes` for `identifier`.
    ///
    /// If the same bytes are already stored under another identifier the
    /// new record is an alias of that file and nothing is written to disk.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyStored`] if `identifier` already has a record
    /// - [`StoreError::FileConflict`] if an unrecorded file holds the name
    /// - [`StoreError::Io`] / [`StoreError::Database`] on write failures;
    ///   nothing is left behind in either case
    #[instrument(skip(self, bytes), fields(identifier = %identifier, source = source_name, bytes = bytes.len()))]
    pub async fn write(
        &self,
        identifier: &ChemicalIdentifier,
        bytes: &[u8],
        source_name: &str,
    ) -> Result<StoredDocument, StoreError> {
        let digest = checksum(bytes);
        let byte_size = i64::try_from(bytes.len()).unwrap_or(i64::MAX);
        let _writer = self.db.writer().await;

        if self.exists(identifier).await? {
            return Err(StoreError::AlreadyStored {
                identifier: identifier.to_string(),
            });
        }

        let owner: Option<(String, String)> = sqlx::query_as(
            "SELECT identifier, file_path FROM sds_documents \
             WHERE checksum = ? AND duplicate_of IS NULL ORDER BY id LIMIT 1",
        )
        .bind(&digest)
        .fetch_optional(self.db.pool())
        .await?;

        if let Some((owner_identifier, owner_path)) = owner {
            info!(owner = %owner_identifier, "identical content already stored; recording alias");
            sqlx::query(
                "INSERT INTO sds_documents \
                 (identifier, file_path, byte_size, checksum, source_name, duplicate_of) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(identifier.as_str())
            .bind(&owner_path)
            .bind(byte_size)
            .bind(&digest)
            .bind(source_name)
            .bind(&owner_identifier)
            .execute(self.db.pool())
            .await?;
        } else {
            let path = self.path_for(identifier);
            self.write_exclusive(&path, bytes).await?;

            let inserted = sqlx::query(
                "INSERT INTO sds_documents \
                 (identifier, file_path, byte_size, checksum, source_name) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(identifier.as_str())
            .bind(path.to_string_lossy().as_ref())
            .bind(byte_size)
            .bind(&digest)
            .bind(source_name)
            .execute(self.db.pool())
            .await;

            if let Err(error) = inserted {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %cleanup, "failed to remove file after metadata insert failed");
                }
                return Err(error.into());
            }
            debug!(path = %path.display(), "document written");
        }

        self.lookup(identifier)
            .await?
            .ok_or_else(|| StoreError::not_found(identifier))
    }

    /// Writes `bytes` to `path` via a temp file and an exclusive hard link.
    async fn write_exclusive(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = self
            .root
            .join(format!(".{file_name}.{}.part", std::process::id()));

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .await
                .map_err(|e| StoreError::io(&temp_path, e))?;
            file.write_all(bytes)
                .await
                .map_err(|e| StoreError::io(&temp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| StoreError::io(&temp_path, e))?;
            drop(file);

            link_exclusive(&temp_path, path).await
        }
        .await;

        if let Err(error) = tokio::fs::remove_file(&temp_path).await
            && error.kind() != ErrorKind::NotFound
        {
            warn!(path = %temp_path.display(), error = %error, "failed to remove temp file");
        }
        result
    }

    /// Reads the bytes stored for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored, or
    /// [`StoreError::Io`] when the file cannot be read.
    pub async fn read(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<(StoredDocument, Vec<u8>), StoreError> {
        let document = self
            .lookup(identifier)
            .await?
            .ok_or_else(|| StoreError::not_found(identifier))?;
        let bytes = tokio::fs::read(&document.file_path)
            .await
            .map_err(|e| StoreError::io(&document.file_path, e))?;
        Ok((document, bytes))
    }

    /// Checks the file behind `identifier`'s record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored.
    pub async fn validate(
        &self,
        identifier: &ChemicalIdentifier,
    ) -> Result<ValidationReport, StoreError> {
        let document = self
            .lookup(identifier)
            .await?
            .ok_or_else(|| StoreError::not_found(identifier))?;
        Ok(validate::inspect(identifier.as_str(), &document.file_path).await)
    }

    /// Deletes `identifier`'s record and hazard record so it can be fetched
    /// again.
    ///
    /// The file is deleted only when no alias still points at it; otherwise
    /// the oldest alias becomes the new owner and the file moves to that
    /// alias's own name, leaving `identifier`'s name free.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing is stored.
    #[instrument(skip(self), fields(identifier = %identifier))]
    pub async fn remove(&self, identifier: &ChemicalIdentifier) -> Result<StoredDocument, StoreError> {
        let _writer = self.db.writer().await;
        let document = self
            .lookup(identifier)
            .await?
            .ok_or_else(|| StoreError::not_found(identifier))?;

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM sds_documents WHERE identifier = ?")
            .bind(identifier.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM hazard_records WHERE identifier = ?")
            .bind(identifier.as_str())
            .execute(&mut *tx)
            .await?;

        let mut delete_file = false;
        let mut relinked: Option<PathBuf> = None;
        if !document.is_alias() {
            let heir: Option<(String,)> = sqlx::query_as(
                "SELECT identifier FROM sds_documents WHERE duplicate_of = ? ORDER BY id LIMIT 1",
            )
            .bind(identifier.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            match heir {
                Some((heir,)) => {
                    // The heir's own name frees `identifier`'s name for a re-fetch.
                    let heir_id = ChemicalIdentifier::parse(&heir).map_err(|e| {
                        StoreError::InvalidRecord {
                            identifier: heir.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    let heir_path = self.path_for(&heir_id);
                    let heir_path_str = heir_path.to_string_lossy().into_owned();
                    sqlx::query(
                        "UPDATE sds_documents SET duplicate_of = NULL, file_path = ? \
                         WHERE identifier = ?",
                    )
                    .bind(&heir_path_str)
                    .bind(&heir)
                    .execute(&mut *tx)
                    .await?;
                    sqlx::query(
                        "UPDATE sds_documents SET duplicate_of = ?, file_path = ? \
                         WHERE duplicate_of = ?",
                    )
                    .bind(&heir)
                    .bind(&heir_path_str)
                    .bind(identifier.as_str())
                    .execute(&mut *tx)
                    .await?;

                    link_exclusive(&document.file_path, &heir_path).await?;
                    relinked = Some(heir_path);
                    debug!(heir = %heir, "file handed over to remaining alias");
                }
                None => delete_file = true,
            }
        }

        if let Err(error) = tx.commit().await {
            if let Some(heir_path) = &relinked
                && let Err(cleanup) = tokio::fs::remove_file(heir_path).await
            {
                warn!(path = %heir_path.display(), error = %cleanup, "failed to undo file handover");
            }
            return Err(error.into());
        }

        if (delete_file || relinked.is_some())
            && let Err(error) = tokio::fs::remove_file(&document.file_path).await
            && error.kind() != ErrorKind::NotFound
        {
            return Err(StoreError::io(&document.file_path, error));
        }
        info!("stored document removed");
        Ok(document)
    }

    /// Counts stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when a query fails.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (documents, unique_files, total_bytes): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN duplicate_of IS NULL THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN duplicate_of IS NULL THEN byte_size ELSE 0 END), 0) \
             FROM sds_documents",
        )
        .fetch_one(self.db.pool())
        .await?;

        let by_source: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source_name, COUNT(*) FROM sds_documents GROUP BY source_name ORDER BY source_name",
        )
        .fetch_all(self.db.pool())
        .await?;

        let to_u64 = |value: i64| u64::try_from(value).unwrap_or(0);
        Ok(StoreStats {
            documents: to_u64(documents),
            unique_files: to_u64(unique_files),
            duplicate_aliases: to_u64(documents - unique_files),
            total_bytes: to_u64(total_bytes),
            by_source: by_source
                .into_iter()
                .map(|(name, count)| (name, to_u64(count)))
                .collect(),
        })
    }
}

/// Hard-links `from` to `to`; fails with [`StoreError::FileConflict`] if `to` exists.
async fn link_exclusive(from: &Path, to: &Path) -> Result<(), StoreError> {
    tokio::fs::hard_link(from, to)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StoreError::FileConflict {
                path: to.to_path_buf(),
            },
            _ => StoreError::io(to, e),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PDF_A: &[u8] = b"%PDF-1.4 acetone";
    const PDF_B: &[u8] = b"%PDF-1.4 ethanol";

    async fn store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new_in_memory().await.unwrap();
        let store = ContentStore::open(dir.path().join("sds"), db).await.unwrap();
        (dir, store)
    }

    fn id(value: &str) -> ChemicalIdentifier {
        ChemicalIdentifier::parse(value).unwrap()
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_write_then_lookup_and_read() {
        let (_dir, store) = store().await;
        let acetone = id("67-64-1");

        assert!(!store.exists(&acetone).await.unwrap());
        let doc = store.write(&acetone, PDF_A, "vwr").await.unwrap();

        assert!(store.exists(&acetone).await.unwrap());
        assert_eq!(doc.file_path, store.root().join("67-64-1-SDS.pdf"));
        assert_eq!(doc.byte_size, PDF_A.len() as u64);
        assert_eq!(doc.checksum, checksum(PDF_A));
        assert_eq!(doc.source_name, "vwr");
        assert!(!doc.is_alias());

        let (_, bytes) = store.read(&acetone).await.unwrap();
        assert_eq!(bytes, PDF_A);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (_dir, store) = store().await;
        store.write(&id("67-64-1"), PDF_A, "vwr").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["67-64-1-SDS.pdf"]);
    }

    #[tokio::test]
    async fn test_write_twice_is_rejected() {
        let (_dir, store) = store().await;
        let acetone = id("67-64-1");
        store.write(&acetone, PDF_A, "vwr").await.unwrap();

        let second = store.write(&acetone, PDF_B, "tci").await;
        assert!(matches!(second, Err(StoreError::AlreadyStored { .. })));
        let (_, bytes) = store.read(&acetone).await.unwrap();
        assert_eq!(bytes, PDF_A, "first write must be untouched");
    }

    #[tokio::test]
    async fn test_identical_bytes_become_alias_without_new_file() {
        let (_dir, store) = store().await;
        let first = store.write(&id("67-64-1"), PDF_A, "vwr").await.unwrap();
        let second = store.write(&id("67-64-1-b"), PDF_A, "tci").await.unwrap();

        assert_eq!(second.checksum, first.checksum);
        assert_eq!(second.file_path, first.file_path);
        assert_eq!(second.duplicate_of, Some(id("67-64-1")));
        assert_eq!(second.file_name(), "67-64-1-b-SDS.pdf");
        assert!(!store.root().join("67-64-1-b-SDS.pdf").exists());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.unique_files, 1);
        assert_eq!(stats.duplicate_aliases, 1);
        assert_eq!(stats.total_bytes, PDF_A.len() as u64);
    }

    #[tokio::test]
    async fn test_unrecorded_file_is_never_overwritten() {
        let (_dir, store) = store().await;
        let acetone = id("67-64-1");
        std::fs::write(store.path_for(&acetone), b"manual").unwrap();

        let result = store.write(&acetone, PDF_A, "vwr").await;

        assert!(matches!(result, Err(StoreError::FileConflict { .. })));
        assert!(!store.exists(&acetone).await.unwrap());
        assert_eq!(std::fs::read(store.path_for(&acetone)).unwrap(), b"manual");
    }

    #[tokio::test]
    async fn test_remove_owner_promotes_alias_and_keeps_file() {
        let (_dir, store) = store().await;
        let owner = store.write(&id("1-1-1"), PDF_A, "vwr").await.unwrap();
        store.write(&id("2-2-2"), PDF_A, "vwr").await.unwrap();
        store.write(&id("3-3-3"), PDF_A, "vwr").await.unwrap();

        store.remove(&id("1-1-1")).await.unwrap();

        assert!(!owner.file_path.exists());
        let heir = store.lookup(&id("2-2-2")).await.unwrap().unwrap();
        assert_eq!(heir.duplicate_of, None);
        assert_eq!(heir.file_path, store.path_for(&id("2-2-2")));
        let other = store.lookup(&id("3-3-3")).await.unwrap().unwrap();
        assert_eq!(other.duplicate_of, Some(id("2-2-2")));
        assert_eq!(other.file_path, heir.file_path);
        assert_eq!(store.read(&id("3-3-3")).await.unwrap().1, PDF_A);
    }

    #[tokio::test]
    async fn test_removed_owner_can_store_different_bytes_again() {
        let (_dir, store) = store().await;
        store.write(&id("1-1-1"), PDF_A, "vwr").await.unwrap();
        store.write(&id("2-2-2"), PDF_A, "vwr").await.unwrap();

        store.remove(&id("1-1-1")).await.unwrap();
        let refetched = store
            .write(&id("1-1-1"), b"%PDF-1.4 new revision", "tci")
            .await
            .unwrap();

        assert!(!refetched.is_alias());
        assert_eq!(refetched.file_path, store.path_for(&id("1-1-1")));
        assert_eq!(
            store.read(&id("1-1-1")).await.unwrap().1,
            b"%PDF-1.4 new revision"
        );
        assert_eq!(store.read(&id("2-2-2")).await.unwrap().1, PDF_A);
        assert_eq!(store.stats().await.unwrap().unique_files, 2);
    }

    #[tokio::test]
    async fn test_remove_last_reference_deletes_file() {
        let (_dir, store) = store().await;
        let doc = store.write(&id("67-64-1"), PDF_A, "vwr").await.unwrap();

        store.remove(&id("67-64-1")).await.unwrap();

        assert!(!doc.file_path.exists());
        assert!(!store.exists(&id("67-64-1")).await.unwrap());
        assert!(store.remove(&id("67-64-1")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stats_by_source() {
        let (_dir, store) = store().await;
        store.write(&id("1-1-1"), PDF_A, "vwr").await.unwrap();
        store.write(&id("2-2-2"), PDF_B, "tci").await.unwrap();
        store.write(&id("3-3-3"), b"%PDF other", "vwr").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.by_source.get("vwr"), Some(&2));
        assert_eq!(stats.by_source.get("tci"), Some(&1));
        assert_eq!(stats.duplicate_aliases, 0);
    }

    #[tokio::test]
    async fn test_validate_flags_corrupted_file() {
        let (_dir, store) = store().await;
        let doc = store.write(&id("67-64-1"), PDF_A, "vwr").await.unwrap();
        assert!(store.validate(&id("67-64-1")).await.unwrap().valid);

        std::fs::write(&doc.file_path, b"<html>").unwrap();
        let report = store.validate(&id("67-64-1")).await.unwrap();
        assert!(!report.valid);
        assert!(!report.is_pdf);
    }
}
