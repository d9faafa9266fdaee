//! In-memory TF-IDF retrieval over a small knowledge base.
//!
//! Documents are tokenized, counted and ranked against a question by cosine
//! similarity of sublinear TF-IDF vectors. The whole state can be captured
//! in a [`Snapshot`] and restored in a later process with identical rankings.

pub mod api;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod ranking;
pub mod snapshot;
pub mod storage;
pub mod tokenizer;
pub mod vector;

// Re-export commonly used types
pub use config::Config;
pub use document::{Document, DocumentInput, DocumentStore};
pub use engine::{EngineStats, RetrievalEngine, DEFAULT_TOP_K};
pub use error::{Error, Result};
pub use index::FrequencyIndex;
pub use ranking::{top_k, ScoredDocument};
pub use snapshot::{RestoreStatus, Restored, Snapshot};
pub use storage::{MemorySnapshotStore, SledStorage, SnapshotStore};
pub use tokenizer::{StandardTokenizer, Tokenizer};
pub use vector::TermVector;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
