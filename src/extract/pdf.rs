//! Default text extraction via `pdf-extract`.

use std::panic::{AssertUnwindSafe, catch_unwind};

use super::{ExtractError, TextExtractor};

/// Extracts the text layer of a PDF.
///
/// Malformed documents can make the parser panic; that is caught and
/// reported as [`ExtractError::Text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(document))) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(error)) => Err(ExtractError::text(error.to_string())),
            Err(_) => Err(ExtractError::text("PDF parser panicked on malformed document")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        let result = PdfTextExtractor.extract_text(b"%PDF-1.4 not really a pdf");
        assert!(matches!(result, Err(ExtractError::Text { .. })));
    }
}
