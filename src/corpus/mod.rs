//! Page corpus: global page identity and per-page records
//!
//! Every downstream stage refers to a page only through its [`PageKey`],
//! never through a position in some intermediate vector.

mod indexer;
mod text;

pub use indexer::{BatchReport, CorpusIndexer, FileOutcome, FileReport};
pub use text::{normalize_whitespace, unique_word_count};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Stable identity of a page across an ordered batch of files
///
/// Ordering is `(file_index, page_index)` ascending, which is document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub file_index: usize,
    pub page_index: usize,
}

impl PageKey {
    pub fn new(file_index: usize, page_index: usize) -> Self {
        Self {
            file_index,
            page_index,
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_index, self.page_index)
    }
}

/// One page that survived extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub key: PageKey,
    /// Whitespace-normalized (optionally lower-cased) text
    pub text: String,
    pub unique_words: usize,
    pub tokens: usize,
    /// `None` until the intelligibility filter has run
    pub intelligible: Option<bool>,
    /// Dense embedding; absent for sparse lexical vectors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Lexical relevance over the pre-deduplication corpus
    pub relevance: f32,
    pub similar: BTreeSet<PageKey>,
    pub file_index: usize,
    pub file_path: PathBuf,
    pub page_index: usize,
}

impl PageRecord {
    pub fn is_intelligible(&self) -> bool {
        self.intelligible.unwrap_or(false)
    }
}

/// All indexed pages of one run, keyed and in document order
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: BTreeMap<PageKey, PageRecord>,
}

impl Corpus {
    pub fn insert(&mut self, record: PageRecord) {
        self.records.insert(record.key, record);
    }

    pub fn get(&self, key: &PageKey) -> Option<&PageRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &PageKey) -> Option<&mut PageRecord> {
        self.records.get_mut(key)
    }

    /// Keys in document order
    pub fn keys(&self) -> Vec<PageKey> {
        self.records.keys().copied().collect()
    }

    /// Records in document order
    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.values()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut PageRecord> {
        self.records.values_mut()
    }

    /// Keys of intelligible pages, in document order
    pub fn intelligible_keys(&self) -> Vec<PageKey> {
        self.records
            .values()
            .filter(|r| r.is_intelligible())
            .map(|r| r.key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> BTreeMap<PageKey, PageRecord> {
        self.records
    }
}
