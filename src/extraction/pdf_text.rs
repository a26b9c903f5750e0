use std::path::Path;

use super::{ensure_exists, select_pages, split_pages, ExtractionError, PageExtractor};

/// Whole-document text layer via pdf-extract, split into pages on form feeds
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    fn read_pages(path: &Path) -> Result<Vec<String>, ExtractionError> {
        ensure_exists(path)?;

        let text = pdf_extract::extract_text(path).map_err(|e| {
            let message = e.to_string();
            if message.contains("password") || message.contains("encrypted") {
                ExtractionError::PasswordProtected(path.to_path_buf())
            } else {
                ExtractionError::Unreadable {
                    path: path.to_path_buf(),
                    message,
                }
            }
        })?;

        Ok(split_pages(&text))
    }
}

impl PageExtractor for PdfTextExtractor {
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
        "pdf-extract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file() {
        let result = PdfTextExtractor.page_count(Path::new("/nonexistent/path/to/file.pdf"));
        assert!(matches!(result, Err(ExtractionError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"This is not a valid PDF").unwrap();
        temp_file.flush().unwrap();

        assert!(PdfTextExtractor.extract(temp_file.path(), None).is_err());
    }
}
