use lopdf::Document;
use std::path::Path;

use super::{ensure_exists, ExtractionError, PageExtractor};

/// Per-page text from PDF content streams via lopdf
pub struct LopdfExtractor;

impl LopdfExtractor {
    fn open(path: &Path) -> Result<Document, ExtractionError> {
        ensure_exists(path)?;

        let document = Document::load(path).map_err(|e| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if document.is_encrypted() {
            return Err(ExtractionError::PasswordProtected(path.to_path_buf()));
        }

        Ok(document)
    }
}

impl PageExtractor for LopdfExtractor {
    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        Ok(Self::open(path)?.get_pages().len())
    }

    fn extract(
        &self,
        path: &Path,
        indices: Option<&[usize]>,
    ) -> Result<Vec<(usize, String)>, ExtractionError> {
        let document = Self::open(path)?;
        // lopdf numbers pages from 1
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let count = page_numbers.len();

        let wanted: Vec<usize> = match indices {
            None => (0..count).collect(),
            Some(indices) => {
                let mut sorted = indices.to_vec();
                sorted.sort_unstable();
                sorted.dedup();
                sorted
            }
        };

        let mut pages = Vec::with_capacity(wanted.len());
        for index in wanted {
            let number = *page_numbers
                .get(index)
                .ok_or(ExtractionError::PageOutOfRange { index, count })?;

            // A page whose content stream cannot be decoded yields no text
            // rather than failing the whole document.
            let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                tracing::debug!("lopdf could not decode page {} of {:?}: {}", number, path, e);
                String::new()
            });
            pages.push((index, text));
        }

        Ok(pages)
    }

    fn name(&self) -> &'static str {
        "lopdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file() {
        let result = LopdfExtractor.page_count(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(ExtractionError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"%PDF-garbage").unwrap();
        temp_file.flush().unwrap();

        let result = LopdfExtractor.page_count(temp_file.path());
        assert!(matches!(result, Err(ExtractionError::Unreadable { .. })));
    }
}
