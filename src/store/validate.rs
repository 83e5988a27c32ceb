//! On-disk sanity checks for stored documents.

use std::path::Path;

use serde::Serialize;

use crate::fetch::PDF_MAGIC;

/// Result of checking a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Identifier the file belongs to.
    pub identifier: String,
    /// True when every check passed.
    pub valid: bool,
    /// File is present on disk.
    pub file_exists: bool,
    /// File size in bytes (0 when missing).
    pub file_size: u64,
    /// File starts with the PDF magic header.
    pub is_pdf: bool,
    /// Human-readable failures, in check order.
    pub errors: Vec<String>,
}

/// Checks that `path` exists, is non-empty and starts with `%PDF`.
pub(crate) async fn inspect(identifier: &str, path: &Path) -> ValidationReport {
    let mut report = ValidationReport {
        identifier: identifier.to_string(),
        valid: false,
        file_exists: false,
        file_size: 0,
        is_pdf: false,
        errors: Vec::new(),
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) | Err(_) => {
            report.errors.push(format!("file not found: {}", path.display()));
            return report;
        }
    };
    report.file_exists = true;
    report.file_size = metadata.len();
    if report.file_size == 0 {
        report.errors.push("file is empty".to_string());
        return report;
    }

    match read_header(path).await {
        Ok(header) if header.starts_with(PDF_MAGIC) => report.is_pdf = true,
        Ok(_) => report.errors.push("file does not start with %PDF".to_string()),
        Err(error) => report.errors.push(format!("cannot read file: {error}")),
    }

    report.valid = report.errors.is_empty();
    report
}

async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut header = vec![0_u8; PDF_MAGIC.len()];
    let read = file.read(&mut header).await?;
    header.truncate(read);
    Ok(header)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inspect_valid_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.7\n...").unwrap();

        let report = inspect("a", &path).await;
        assert!(report.valid);
        assert!(report.is_pdf);
        assert_eq!(report.file_size, 12);
    }

    #[tokio::test]
    async fn test_inspect_reports_each_failure() {
        let dir = tempfile::tempdir().unwrap();

        let missing = inspect("m", &dir.path().join("missing.pdf")).await;
        assert!(!missing.file_exists);
        assert!(!missing.valid);

        let empty_path = dir.path().join("empty.pdf");
        std::fs::write(&empty_path, b"").unwrap();
        let empty = inspect("e", &empty_path).await;
        assert!(empty.file_exists);
        assert_eq!(empty.errors, ["file is empty"]);

        let html_path = dir.path().join("html.pdf");
        std::fs::write(&html_path, b"<html>login</html>").unwrap();
        let html = inspect("h", &html_path).await;
        assert!(!html.is_pdf);
        assert!(!html.valid);
    }
}
