use crate::document::{count_terms, Document, DocumentInput, DocumentStore};
use crate::error::{Error, Result};
use crate::index::FrequencyIndex;
use crate::ranking::{rank, ScoredDocument};
use crate::snapshot::{Restored, Snapshot};
use crate::tokenizer::{StandardTokenizer, Tokenizer};
use crate::vector::vectorize;
use serde::Serialize;

/// Number of documents handed to prompt assembly unless the caller asks otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Engine statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub total_documents: usize,
    pub vocabulary_size: usize,
    pub cached_idf_entries: usize,
    pub generation: u64,
}

/// The full retrieval state: corpus, frequencies and tokenizer.
///
/// Owned by a single request at a time. Build it from a snapshot, use it,
/// then snapshot it back out.
#[derive(Debug, Clone, Default)]
pub struct RetrievalEngine<T: Tokenizer = StandardTokenizer> {
    store: DocumentStore,
    index: FrequencyIndex,
    tokenizer: T,
}

impl RetrievalEngine<StandardTokenizer> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a snapshot's JSON text; `None` means nothing was persisted.
    pub fn restore_json(input: Option<&str>) -> Restored<StandardTokenizer> {
        Snapshot::decode_json(input).into_engine(StandardTokenizer::new())
    }

    /// Restore from bincode-encoded snapshot bytes.
    pub fn restore_bytes(input: Option<&[u8]>) -> Restored<StandardTokenizer> {
        Snapshot::decode_bytes(input).into_engine(StandardTokenizer::new())
    }
}

impl<T: Tokenizer> RetrievalEngine<T> {
    pub fn with_tokenizer(tokenizer: T) -> Self {
        Self {
            store: DocumentStore::new(),
            index: FrequencyIndex::new(),
            tokenizer,
        }
    }

    pub(crate) fn from_parts(store: DocumentStore, index: FrequencyIndex, tokenizer: T) -> Self {
        Self {
            store,
            index,
            tokenizer,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &FrequencyIndex {
        &self.index
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Add a document and return its ordinal.
    ///
    /// Cached IDF values go stale rather than being cleared; they refresh on
    /// lookup or on the next `compute_idf_bulk`.
    pub fn add_document(
        &mut self,
        input: impl Into<DocumentInput>,
        key: Option<String>,
    ) -> Result<usize> {
        let term_counts = match input.into() {
            DocumentInput::RawText(text) => {
                if text.trim().is_empty() {
                    return Err(Error::InvalidInput("document text is empty".to_string()));
                }
                count_terms(&self.tokenizer.tokenize(&text))
            }
            DocumentInput::Tokens(tokens) => {
                if tokens.iter().all(|t| t.is_empty()) {
                    return Err(Error::InvalidInput("document has no tokens".to_string()));
                }
                let tokens: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
                count_terms(&tokens)
            }
        };

        self.index.record_document(&term_counts);
        let index = self.store.push_counts(term_counts, key);
        tracing::debug!(index, generation = self.index.generation(), "added document");
        Ok(index)
    }

    /// Add a batch of `(text, key)` pairs, then refresh the IDF cache once.
    ///
    /// Stops at the first rejected document; the ones before it stay indexed.
    pub fn add_documents<I, S>(&mut self, documents: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = (S, Option<String>)>,
        S: Into<DocumentInput>,
    {
        let mut added = Vec::new();
        for (input, key) in documents {
            match self.add_document(input, key) {
                Ok(index) => added.push(index),
                Err(err) => {
                    if !added.is_empty() {
                        self.index.compute_idf_bulk();
                    }
                    return Err(err);
                }
            }
        }
        self.index.compute_idf_bulk();
        Ok(added)
    }

    pub fn get(&self, index: usize) -> Result<&Document> {
        self.store.get(index)
    }

    pub fn len(&self) -> usize {
        self.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.index.document_frequency(term)
    }

    pub fn idf(&mut self, term: &str, force_recompute: bool) -> f64 {
        self.index.idf(term, force_recompute)
    }

    pub fn compute_idf_bulk(&mut self) {
        self.index.compute_idf_bulk();
    }

    /// Score every document against `question`, best first.
    pub fn rank(&mut self, question: &str) -> Result<Vec<ScoredDocument>> {
        if question.trim().is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }
        let tokens = self.tokenizer.tokenize(question);
        let query = vectorize(&tokens, &mut self.index);
        Ok(rank(&query, &self.store, &mut self.index))
    }

    /// The `k` best documents for `question`.
    pub fn retrieve(&mut self, question: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        let mut ranked = self.rank(question)?;
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Capture the full state for persistence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.store, &self.index)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            total_documents: self.store.size(),
            vocabulary_size: self.index.vocabulary_size(),
            cached_idf_entries: self.index.cache_len(),
            generation: self.index.generation(),
        }
    }
}
