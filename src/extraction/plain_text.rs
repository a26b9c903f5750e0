use std::path::Path;

use super::{ensure_exists, select_pages, split_pages, ExtractionError, PageExtractor};

/// Text files whose pages are separated by form feeds (`pdftotext` output)
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    fn read_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
        ensure_exists(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(split_pages(&text))
    }
}

impl PageExtractor for PlainTextExtractor {
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        Ok(Self::read_pages(path)?.len())
    }

    fn extract(
        &self,
        path: &Path,
        indices: Option<&[usize]>,
    ) -> Result<Vec<(usize, String)>, ExtractionError> {
        select_pages(Self::read_pages(path)?, indices)
    }

    fn name(&self) -> &'static str {
        "plain-text"
    }
}
