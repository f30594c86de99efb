//! Text extraction from uploaded document bytes.
//!
//! PDF files are decoded with `pdf-extract` when the `pdf` feature is
//! enabled. Every other file is treated as UTF-8 text.

use tracing::debug;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Extract the plain text of a document.
///
/// A leading byte-order mark is removed and Windows line endings are
/// normalized to `\n`, so chunk boundaries do not depend on the platform the
/// file was written on.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] if the bytes are not valid UTF-8, the PDF
/// cannot be parsed, or the document is a PDF and the `pdf` feature is off.
pub fn extract_text(document: &Document) -> Result<String> {
    let text = match document.extension().as_deref() {
        Some("pdf") => extract_pdf(document)?,
        _ => std::str::from_utf8(&document.bytes)
            .map_err(|e| RagError::Extraction {
                document: document.name.clone(),
                message: format!("not valid UTF-8 text: {e}"),
            })?
            .to_string(),
    };

    let text = text.strip_prefix('\u{feff}').unwrap_or(&text).replace("\r\n", "\n");
    debug!(document = %document.name, chars = text.chars().count(), "extracted text");
    Ok(text)
}

#[cfg(feature = "pdf")]
fn extract_pdf(document: &Document) -> Result<String> {
    pdf_extract::extract_text_from_mem(&document.bytes).map_err(|e| RagError::Extraction {
        document: document.name.clone(),
        message: format!("failed to read PDF: {e}"),
    })
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(document: &Document) -> Result<String> {
    Err(RagError::Extraction {
        document: document.name.clone(),
        message: "PDF support not enabled (build with the `pdf` feature)".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_normalized() {
        let doc = Document::new("notes.txt", "\u{feff}line one\r\nline two".as_bytes().to_vec());
        assert_eq!(extract_text(&doc).unwrap(), "line one\nline two");
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let doc = Document::new("blob.txt", vec![0xff, 0xfe, 0xfd]);
        let err = extract_text(&doc).unwrap_err();
        assert!(matches!(err, RagError::Extraction { ref document, .. } if document == "blob.txt"));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn pdf_without_feature_is_rejected() {
        let doc = Document::new("paper.pdf", b"%PDF-1.7".to_vec());
        assert!(matches!(extract_text(&doc), Err(RagError::Extraction { .. })));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn malformed_pdf_is_an_extraction_error() {
        let doc = Document::new("paper.pdf", b"not a pdf".to_vec());
        assert!(matches!(extract_text(&doc), Err(RagError::Extraction { .. })));
    }
}
