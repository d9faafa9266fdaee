//! Flat, serializable capture of the whole engine state.
//!
//! Documents are stored as raw term counts together with the IDF cache.
//! Document frequencies are not stored; they are rebuilt from the documents
//! on restore. Decoding never fails: missing or malformed input yields an
//! empty engine and a [`RestoreStatus`] telling the caller which case it was.

use crate::document::{Document, DocumentStore};
use crate::engine::RetrievalEngine;
use crate::index::{CachedIdf, FrequencyIndex};
use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub generation: u64,
    pub documents: Vec<Document>,
    pub idf_cache: BTreeMap<String, CachedIdf>,
}

/// Outcome of decoding persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    /// State was decoded and validated.
    Restored,
    /// Nothing had been persisted yet.
    Absent,
    /// Persisted state was unreadable and has been replaced by an empty engine.
    Corrupt,
}

/// A decoded snapshot, or an empty one standing in for absent/corrupt input.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub snapshot: Snapshot,
    pub status: RestoreStatus,
}

/// An engine rebuilt from persisted state.
#[derive(Debug)]
pub struct Restored<T: Tokenizer> {
    pub engine: RetrievalEngine<T>,
    pub status: RestoreStatus,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generation: 0,
            documents: Vec::new(),
            idf_cache: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    pub fn capture(store: &DocumentStore, index: &FrequencyIndex) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            generation: index.generation(),
            documents: store.iter().cloned().collect(),
            idf_cache: index
                .idf_cache()
                .iter()
                .map(|(term, cached)| (term.clone(), *cached))
                .collect(),
        }
    }

    /// Encode as JSON text, safe for text-only storage backends.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Encode as compact bincode bytes.
    pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode_json(input: Option<&str>) -> Decoded {
        match input {
            None => Decoded::absent(),
            Some(text) => Decoded::from_parse(serde_json::from_str(text).map_err(|e| e.to_string())),
        }
    }

    pub fn decode_bytes(input: Option<&[u8]>) -> Decoded {
        match input {
            None => Decoded::absent(),
            Some(bytes) => Decoded::from_parse(bincode::deserialize(bytes).map_err(|e| e.to_string())),
        }
    }

    /// Check the structural invariants a restored engine relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        for (position, doc) in self.documents.iter().enumerate() {
            if doc.index != position {
                return Err(format!(
                    "document at position {} claims index {}",
                    position, doc.index
                ));
            }
            if let Some((term, _)) = doc.term_counts.iter().find(|&(t, &c)| t.is_empty() || c == 0) {
                return Err(format!("document {} has an invalid count for {:?}", doc.index, term));
            }
        }
        if let Some((term, _)) = self.idf_cache.iter().find(|(_, c)| !c.value.is_finite()) {
            return Err(format!("non-finite idf cached for {:?}", term));
        }
        if let Some((term, c)) = self.idf_cache.iter().find(|(_, c)| c.generation > self.generation) {
            return Err(format!(
                "idf for {:?} cached at generation {} after snapshot generation {}",
                term, c.generation, self.generation
            ));
        }
        let vocabulary: HashSet<&str> = self
            .documents
            .iter()
            .flat_map(|doc| doc.term_counts.keys().map(String::as_str))
            .collect();
        if let Some(term) = self.idf_cache.keys().find(|t| !vocabulary.contains(t.as_str())) {
            return Err(format!("idf cached for {:?}, which no document contains", term));
        }
        Ok(())
    }
}

impl Decoded {
    fn absent() -> Self {
        Self {
            snapshot: Snapshot::default(),
            status: RestoreStatus::Absent,
        }
    }

    fn corrupt() -> Self {
        Self {
            snapshot: Snapshot::default(),
            status: RestoreStatus::Corrupt,
        }
    }

    fn from_parse(parsed: Result<Snapshot, String>) -> Self {
        let checked = parsed.and_then(|snapshot| snapshot.validate().map(|_| snapshot));
        match checked {
            Ok(snapshot) => Self {
                snapshot,
                status: RestoreStatus::Restored,
            },
            Err(reason) => {
                tracing::warn!(%reason, "discarding corrupt snapshot, starting empty");
                Self::corrupt()
            }
        }
    }

    /// Rebuild the document store and frequency index.
    pub fn into_engine<T: Tokenizer>(self, tokenizer: T) -> Restored<T> {
        let Snapshot {
            generation,
            documents,
            idf_cache,
            ..
        } = self.snapshot;

        let index = FrequencyIndex::restore(
            documents.iter().map(|doc| &doc.term_counts),
            generation,
            idf_cache.into_iter().collect(),
        );
        let mut store = DocumentStore::new();
        for doc in documents {
            store.push_counts(doc.term_counts, doc.key);
        }

        if self.status == RestoreStatus::Restored {
            tracing::info!(documents = store.size(), generation = index.generation(), "restored snapshot");
        }
        Restored {
            engine: RetrievalEngine::from_parts(store, index, tokenizer),
            status: self.status,
        }
    }
}
