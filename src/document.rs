use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw term counts of one document, ordered by term.
pub type TermCounts = BTreeMap<String, u32>;

/// Document input as accepted at the store boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentInput {
    /// Text to be run through the engine's tokenizer.
    RawText(String),
    /// Pre-split tokens. Lower-cased on entry, otherwise counted as given.
    Tokens(Vec<String>),
}

impl From<&str> for DocumentInput {
    fn from(text: &str) -> Self {
        Self::RawText(text.to_string())
    }
}

impl From<String> for DocumentInput {
    fn from(text: String) -> Self {
        Self::RawText(text)
    }
}

impl From<Vec<String>> for DocumentInput {
    fn from(tokens: Vec<String>) -> Self {
        Self::Tokens(tokens)
    }
}

/// An indexed document. Immutable once added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Insertion ordinal, 0-based.
    pub index: usize,
    /// Caller-supplied identifier, opaque to the index.
    #[serde(default)]
    pub key: Option<String>,
    pub term_counts: TermCounts,
}

impl Document {
    /// Number of distinct terms
    pub fn vocabulary_size(&self) -> usize {
        self.term_counts.len()
    }

    /// Total token count
    pub fn length(&self) -> u64 {
        self.term_counts.values().map(|&c| c as u64).sum()
    }
}

/// Count occurrences of each token, skipping empty strings.
pub fn count_terms<S: AsRef<str>>(tokens: &[S]) -> TermCounts {
    let mut counts = TermCounts::new();
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            continue;
        }
        *counts.entry(token.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Append-only corpus of documents in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the tokens and append them as a new document, returning its ordinal.
    pub fn add_document<S: AsRef<str>>(&mut self, tokens: &[S], key: Option<String>) -> usize {
        self.push_counts(count_terms(tokens), key)
    }

    pub(crate) fn push_counts(&mut self, term_counts: TermCounts, key: Option<String>) -> usize {
        let index = self.documents.len();
        self.documents.push(Document {
            index,
            key,
            term_counts,
        });
        index
    }

    pub fn get(&self, index: usize) -> Result<&Document> {
        self.documents.get(index).ok_or(Error::NotFound {
            index,
            len: self.documents.len(),
        })
    }

    /// Document count `N`.
    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_terms() {
        let counts = count_terms(&["cat", "sat", "cat", ""]);
        assert_eq!(counts.get("cat"), Some(&2));
        assert_eq!(counts.get("sat"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_add_and_get() {
        let mut store = DocumentStore::new();
        assert_eq!(store.add_document(&["cat", "sat"], Some("a".to_string())), 0);
        assert_eq!(store.add_document(&["dog"], None), 1);
        assert_eq!(store.size(), 2);

        let doc = store.get(0).unwrap();
        assert_eq!(doc.index, 0);
        assert_eq!(doc.key.as_deref(), Some("a"));
        assert_eq!(doc.length(), 2);

        // earlier documents are untouched by later inserts
        store.add_document(&["cat", "cat"], None);
        assert_eq!(store.get(0).unwrap().term_counts.get("cat"), Some(&1));
    }

    #[test]
    fn test_get_out_of_range() {
        let store = DocumentStore::new();
        assert_eq!(store.get(3), Err(Error::NotFound { index: 3, len: 0 }));
    }

    #[test]
    fn test_input_conversions() {
        assert_eq!(
            DocumentInput::from("text"),
            DocumentInput::RawText("text".to_string())
        );
        assert_eq!(
            DocumentInput::from(vec!["a".to_string()]),
            DocumentInput::Tokens(vec!["a".to_string()])
        );
    }
}
