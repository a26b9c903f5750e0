use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::text::{normalize_whitespace, unique_word_count};
use super::{Corpus, PageKey, PageRecord};
use crate::error::Result;
use crate::extraction::PageExtractor;
use crate::pipeline::{CancelToken, Stage};
use crate::tokens::Tokenizer;

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Pages were indexed; `blank_pages` of them carry no text and are left
    /// for the intelligibility filter to reject
    Indexed { pages: usize, blank_pages: usize },
    /// The file contributed nothing; the batch continued without it
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file_index: usize,
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Per-file outcomes of one indexing pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn indexed_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Indexed { .. }))
            .count()
    }

    pub fn skipped_files(&self) -> usize {
        self.files.len() - self.indexed_files()
    }
}

/// Assigns global page keys across an ordered batch of files
pub struct CorpusIndexer {
    extractor: Arc<dyn PageExtractor>,
    tokenizer: Arc<dyn Tokenizer>,
    lowercase: bool,
}

impl CorpusIndexer {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        tokenizer: Arc<dyn Tokenizer>,
        lowercase: bool,
    ) -> Self {
        Self {
            extractor,
            tokenizer,
            lowercase,
        }
    }

    /// Extract and index every page of `files`
    ///
    /// A file that cannot be opened, or yields no pages, is skipped and
    /// recorded in the [`BatchReport`]; it never aborts the batch. Blank pages
    /// are indexed like any other page. An empty corpus is returned as-is and
    /// left for the caller to report.
    pub fn index(&self, files: &[PathBuf], cancel: &CancelToken) -> Result<(Corpus, BatchReport)> {
        let mut corpus = Corpus::default();
        let mut report = BatchReport::default();

        for (file_index, path) in files.iter().enumerate() {
            cancel.check(Stage::Indexing)?;

            let outcome = match self.index_file(file_index, path, &mut corpus, cancel)? {
                Ok((pages, blank_pages)) if pages > 0 => {
                    debug!(
                        "Indexed {} pages from {:?} ({} blank)",
                        pages, path, blank_pages
                    );
                    FileOutcome::Indexed { pages, blank_pages }
                }
                Ok(_) => {
                    warn!("Skipping {:?}: no pages extracted", path);
                    FileOutcome::Skipped {
                        reason: "no pages extracted".to_string(),
                    }
                }
                Err(reason) => {
                    warn!("Skipping {:?}: {}", path, reason);
                    FileOutcome::Skipped { reason }
                }
            };

            report.files.push(FileReport {
                file_index,
                path: path.clone(),
                outcome,
            });
        }

        info!(
            "Indexed {} pages from {}/{} files",
            corpus.len(),
            report.indexed_files(),
            files.len()
        );

        Ok((corpus, report))
    }

    /// Index one file; the inner `Err` is a skip reason, the outer one aborts
    fn index_file(
        &self,
        file_index: usize,
        path: &Path,
        corpus: &mut Corpus,
        cancel: &CancelToken,
    ) -> Result<std::result::Result<(usize, usize), String>> {
        let page_count = match self.extractor.page_count(path) {
            Ok(0) => return Ok(Err("document has no pages".to_string())),
            Ok(count) => count,
            Err(e) => return Ok(Err(e.to_string())),
        };

        let pages = match self.extractor.extract(path, None) {
            Ok(pages) => pages,
            Err(e) => return Ok(Err(e.to_string())),
        };

        if pages.len() != page_count {
            debug!(
                "{:?}: extractor returned {} of {} pages",
                path,
                pages.len(),
                page_count
            );
        }

        let mut indexed = 0;
        let mut blank = 0;
        for (page_index, raw) in pages {
            cancel.check(Stage::Indexing)?;

            let mut text = normalize_whitespace(&raw);
            if text.is_empty() {
                blank += 1;
            }
            if self.lowercase {
                text = text.to_lowercase();
            }

            let key = PageKey::new(file_index, page_index);
            corpus.insert(PageRecord {
                key,
                unique_words: unique_word_count(&text),
                tokens: self.tokenizer.count(&text),
                text,
                intelligible: None,
                vector: None,
                relevance: 0.0,
                similar: BTreeSet::new(),
                file_index,
                file_path: path.to_path_buf(),
                page_index,
            });
            indexed += 1;
        }

        Ok(Ok((indexed, blank)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionError;
    use crate::tokens::WhitespaceTokenizer;
    use std::collections::HashMap;

    /// In-memory documents keyed by path; unknown paths fail to open
    struct FakeExtractor {
        documents: HashMap<PathBuf, Vec<String>>,
    }

    impl PageExtractor for FakeExtractor {
        fn page_count(&self, path: &Path) -> std::result::Result<usize, ExtractionError> {
            self.documents
                .get(path)
                .map(Vec::len)
                .ok_or_else(|| ExtractionError::FileNotFound(path.to_path_buf()))
        }

        fn extract(
            &self,
            path: &Path,
            _indices: Option<&[usize]>,
        ) -> std::result::Result<Vec<(usize, String)>, ExtractionError> {
            let pages = self
                .documents
                .get(path)
                .ok_or_else(|| ExtractionError::FileNotFound(path.to_path_buf()))?;
            Ok(pages.iter().cloned().enumerate().collect())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn indexer(documents: Vec<(&str, Vec<&str>)>, lowercase: bool) -> CorpusIndexer {
        let documents = documents
            .into_iter()
            .map(|(path, pages)| {
                (
                    PathBuf::from(path),
                    pages.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        CorpusIndexer::new(
            Arc::new(FakeExtractor { documents }),
            Arc::new(WhitespaceTokenizer),
            lowercase,
        )
    }

    #[test]
    fn test_keys_span_files_in_order() {
        let indexer = indexer(
            vec![("a.pdf", vec!["one", "two"]), ("b.pdf", vec!["three"])],
            false,
        );
        let files = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];

        let (corpus, report) = indexer.index(&files, &CancelToken::new()).unwrap();

        assert_eq!(
            corpus.keys(),
            vec![PageKey::new(0, 0), PageKey::new(0, 1), PageKey::new(1, 0)]
        );
        assert_eq!(report.indexed_files(), 2);
        let third = corpus.get(&PageKey::new(1, 0)).unwrap();
        assert_eq!(third.file_path, PathBuf::from("b.pdf"));
        assert_eq!(third.page_index, 0);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let indexer = indexer(vec![("b.pdf", vec!["text"])], false);
        let files = vec![PathBuf::from("missing.pdf"), PathBuf::from("b.pdf")];

        let (corpus, report) = indexer.index(&files, &CancelToken::new()).unwrap();

        assert_eq!(corpus.keys(), vec![PageKey::new(1, 0)]);
        assert_eq!(report.skipped_files(), 1);
        assert!(matches!(
            report.files[0].outcome,
            FileOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn test_blank_pages_are_indexed() {
        let indexer = indexer(vec![("a.pdf", vec!["first", "  \n ", "third"])], false);
        let files = vec![PathBuf::from("a.pdf")];

        let (corpus, report) = indexer.index(&files, &CancelToken::new()).unwrap();

        assert_eq!(
            corpus.keys(),
            vec![PageKey::new(0, 0), PageKey::new(0, 1), PageKey::new(0, 2)]
        );
        let blank = corpus.get(&PageKey::new(0, 1)).unwrap();
        assert_eq!(blank.text, "");
        assert_eq!(blank.tokens, 0);
        assert_eq!(
            report.files[0].outcome,
            FileOutcome::Indexed {
                pages: 3,
                blank_pages: 1
            }
        );
    }

    #[test]
    fn test_blank_only_file_is_indexed() {
        let indexer = indexer(vec![("scan.pdf", vec!["", " "])], false);
        let files = vec![PathBuf::from("scan.pdf")];

        let (corpus, report) = indexer.index(&files, &CancelToken::new()).unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(report.indexed_files(), 1);
    }

    #[test]
    fn test_record_metrics() {
        let indexer = indexer(vec![("a.pdf", vec!["The  Cat\nthe cat sat"])], true);
        let files = vec![PathBuf::from("a.pdf")];

        let (corpus, _) = indexer.index(&files, &CancelToken::new()).unwrap();
        let record = corpus.get(&PageKey::new(0, 0)).unwrap();

        assert_eq!(record.text, "the cat the cat sat");
        assert_eq!(record.unique_words, 3);
        assert_eq!(record.tokens, 5);
        assert_eq!(record.intelligible, None);
    }

    #[test]
    fn test_all_files_unreadable_yields_empty_corpus() {
        let indexer = indexer(vec![], false);
        let files = vec![PathBuf::from("x.pdf")];

        let (corpus, report) = indexer.index(&files, &CancelToken::new()).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(report.indexed_files(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let indexer = indexer(vec![("a.pdf", vec!["text"])], false);
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = indexer.index(&[PathBuf::from("a.pdf")], &cancel);
        assert!(result.is_err());
    }
}
