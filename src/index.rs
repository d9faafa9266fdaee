use crate::document::TermCounts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A cached IDF value and the index generation it was computed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CachedIdf {
    pub value: f64,
    pub generation: u64,
}

/// Document frequencies plus a lazily refreshed IDF cache.
///
/// Every recorded document bumps `generation`. Cache entries computed at an
/// older generation are stale and get recomputed on their next lookup, so
/// inserting never has to walk the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyIndex {
    df: HashMap<String, u32>,
    num_docs: usize,
    generation: u64,
    idf_cache: HashMap<String, CachedIdf>,
}

/// `ln(N / (1 + df))`, or 0 for a term no document contains.
///
/// Goes negative once `df` reaches `N`; that is expected for terms found in
/// nearly every document.
pub fn idf_formula(num_docs: usize, df: u32) -> f64 {
    if df == 0 || num_docs == 0 {
        return 0.0;
    }
    (num_docs as f64 / (1.0 + df as f64)).ln()
}

impl FrequencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a newly added document.
    pub fn record_document(&mut self, term_counts: &TermCounts) {
        for (term, &count) in term_counts {
            if count > 0 {
                *self.df.entry(term.clone()).or_insert(0) += 1;
            }
        }
        self.num_docs += 1;
        self.generation += 1;
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    /// Documents recorded so far.
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn vocabulary_size(&self) -> usize {
        self.df.len()
    }

    /// Cached IDF entries, fresh or stale.
    pub fn cache_len(&self) -> usize {
        self.idf_cache.len()
    }

    /// IDF of `term`, served from the cache when the entry is current.
    pub fn idf(&mut self, term: &str, force_recompute: bool) -> f64 {
        if !force_recompute {
            if let Some(cached) = self.idf_cache.get(term) {
                if cached.generation == self.generation {
                    return cached.value;
                }
            }
        }

        let df = self.document_frequency(term);
        let value = idf_formula(self.num_docs, df);
        // unseen terms are not cached, they would grow the cache with every query
        if df > 0 {
            self.idf_cache.insert(
                term.to_string(),
                CachedIdf {
                    value,
                    generation: self.generation,
                },
            );
        }
        value
    }

    /// Recompute and cache the IDF of every known term.
    pub fn compute_idf_bulk(&mut self) {
        let num_docs = self.num_docs;
        let generation = self.generation;
        for (term, &df) in &self.df {
            self.idf_cache.insert(
                term.clone(),
                CachedIdf {
                    value: idf_formula(num_docs, df),
                    generation,
                },
            );
        }
        tracing::info!(
            terms = self.df.len(),
            num_docs,
            generation,
            "recomputed idf cache"
        );
    }

    pub(crate) fn idf_cache(&self) -> &HashMap<String, CachedIdf> {
        &self.idf_cache
    }

    /// Rebuild from restored documents and a previously persisted cache.
    pub(crate) fn restore<'a>(
        documents: impl Iterator<Item = &'a TermCounts>,
        generation: u64,
        idf_cache: HashMap<String, CachedIdf>,
    ) -> Self {
        let mut index = Self::new();
        for term_counts in documents {
            index.record_document(term_counts);
        }
        index.generation = generation.max(index.generation);
        index.idf_cache = idf_cache;
        index
    }
}
