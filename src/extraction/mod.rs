//! Page extraction port
//!
//! The pipeline only depends on the [`PageExtractor`] capability: count the
//! pages of a document and return `(page_index, text)` pairs for a selection
//! of them. Concrete backends are chosen through [`ExtractorKind`] and built
//! by [`ExtractorFactory`].

mod lopdf_pages;
mod pdf_text;
mod pdfium;
mod plain_text;

pub use lopdf_pages::LopdfExtractor;
pub use pdf_text::PdfTextExtractor;
pub use pdfium::PdfiumExtractor;
pub use plain_text::PlainTextExtractor;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Page separator used by text-layer dumps and `pdftotext`
pub const FORM_FEED: char = '\x0C';

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unable to read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{0} is password-protected")]
    PasswordProtected(PathBuf),

    #[error("Page {index} out of range for a document with {count} pages")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Extraction backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Capability consumed from an external document parser
pub trait PageExtractor: Send + Sync {
    /// Open the document and return its page count
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError>;

    /// Return `(page_index, text)` pairs in page order
    ///
    /// `indices == None` extracts every page. Indices are zero-based.
    fn extract(
        &self,
        path: &Path,
        indices: Option<&[usize]>,
    ) -> Result<Vec<(usize, String)>, ExtractionError>;

    /// Backend name, for logs and reports
    fn name(&self) -> &'static str;
}

/// Extraction backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Google's PDFium via pdfium-render, per-page text
    Pdfium,
    /// pdf-extract text layer, pages split on form feeds
    PdfExtract,
    /// lopdf content streams, per-page text
    Lopdf,
    /// UTF-8 text files, pages separated by form feeds
    PlainText,
}

pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Build the extractor for `kind`
    ///
    /// Backends that need a native library verify it here so a missing
    /// dependency fails the run before any file is opened.
    pub fn create(kind: ExtractorKind) -> Result<Arc<dyn PageExtractor>, ExtractionError> {
        let extractor: Arc<dyn PageExtractor> = match kind {
            ExtractorKind::Pdfium => Arc::new(PdfiumExtractor::new()?),
            ExtractorKind::PdfExtract => Arc::new(PdfTextExtractor),
            ExtractorKind::Lopdf => Arc::new(LopdfExtractor),
            ExtractorKind::PlainText => Arc::new(PlainTextExtractor),
        };
        tracing::info!("Using {} page extractor", extractor.name());
        Ok(extractor)
    }
}

fn ensure_exists(path: &Path) -> Result<(), ExtractionError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ExtractionError::FileNotFound(path.to_path_buf()))
    }
}

/// Split a whole-document text dump into pages on form feeds
///
/// A trailing separator does not open an extra page.
fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(FORM_FEED).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Pick the requested pages out of a fully extracted document
fn select_pages(
    pages: Vec<String>,
    indices: Option<&[usize]>,
) -> Result<Vec<(usize, String)>, ExtractionError> {
    match indices {
        None => Ok(pages.into_iter().enumerate().collect()),
        Some(wanted) => {
            let count = pages.len();
            let mut sorted = wanted.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            sorted
                .into_iter()
                .map(|index| {
                    pages
                        .get(index)
                        .map(|text| (index, text.clone()))
                        .ok_or(ExtractionError::PageOutOfRange { index, count })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_drops_trailing_separator() {
        let pages = split_pages("one\x0Ctwo\x0C");
        assert_eq!(pages, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_split_pages_keeps_inner_blank_pages() {
        let pages = split_pages("one\x0C\x0Cthree");
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1], "");
    }

    #[test]
    fn test_select_pages_subset() {
        let pages = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let selected = select_pages(pages, Some(&[2, 0, 2])).unwrap();
        assert_eq!(selected, vec![(0, "a".to_string()), (2, "c".to_string())]);
    }

    #[test]
    fn test_select_pages_out_of_range() {
        let pages = vec!["a".to_string()];
        let result = select_pages(pages, Some(&[3]));
        assert!(matches!(
            result,
            Err(ExtractionError::PageOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_kind_serde_names() {
        let kind: ExtractorKind = serde_json::from_str("\"pdf_extract\"").unwrap();
        assert_eq!(kind, ExtractorKind::PdfExtract);
    }
}
