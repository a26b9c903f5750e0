use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

use super::{ensure_exists, ExtractionError, PageExtractor};

/// Environment variable naming a directory that contains the PDFium library
pub const PDFIUM_DIR_ENV: &str = "PDFIUM_LIB_DIR";

/// Per-page text via Google's PDFium
///
/// PDFium is bound afresh for each document; only the library location is
/// kept, which leaves the extractor `Send + Sync` whatever the bindings are.
pub struct PdfiumExtractor {
    library_dir: Option<PathBuf>,
}

impl PdfiumExtractor {
    /// Locate and test-bind the PDFium library
    pub fn new() -> Result<Self, ExtractionError> {
        let library_dir = std::env::var_os(PDFIUM_DIR_ENV).map(PathBuf::from);
        let extractor = Self { library_dir };
        extractor.bind()?;
        Ok(extractor)
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractionError::BackendUnavailable(format!("pdfium bind failed: {e:?}")))?;

        Ok(Pdfium::new(bindings))
    }

    fn with_document<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&PdfDocument) -> Result<T, ExtractionError>,
    ) -> Result<T, ExtractionError> {
        ensure_exists(path)?;
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            let message = format!("{e:?}");
            if message.to_lowercase().contains("password") {
                ExtractionError::PasswordProtected(path.to_path_buf())
            } else {
                ExtractionError::Unreadable {
                    path: path.to_path_buf(),
                    message,
                }
            }
        })?;
        f(&document)
    }
}

impl PageExtractor for PdfiumExtractor {
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        self.with_document(path, |document| Ok(document.pages().len() as usize))
    }

    fn extract(
        &self,
        path: &Path,
        indices: Option<&[usize]>,
    ) -> Result<Vec<(usize, String)>, ExtractionError> {
        self.with_document(path, |document| {
            let pages = document.pages();
            let count = pages.len() as usize;

            let wanted: Vec<usize> = match indices {
                None => (0..count).collect(),
                Some(indices) => {
                    let mut sorted = indices.to_vec();
                    sorted.sort_unstable();
                    sorted.dedup();
                    sorted
                }
            };

            let mut result = Vec::with_capacity(wanted.len());
            for index in wanted {
                if index >= count {
                    return Err(ExtractionError::PageOutOfRange { index, count });
                }
                let page = pages
                    .get(index as u16)
                    .map_err(|e| ExtractionError::Unreadable {
                        path: path.to_path_buf(),
                        message: format!("failed to load page {index}: {e:?}"),
                    })?;
                let text = page
                    .text()
                    .map(|text| text.all())
                    .map_err(|e| ExtractionError::Unreadable {
                        path: path.to_path_buf(),
                        message: format!("failed to read text of page {index}: {e:?}"),
                    })?;
                result.push((index, text));
            }
            Ok(result)
        })
    }

    fn name(&self) -> &'static str {
        "pdfium"
    }
}
