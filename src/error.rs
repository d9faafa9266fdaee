/// Errors surfaced by the retrieval core.
///
/// None of these are fatal: each one rejects a single request and leaves the
/// engine state untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Document or query text was empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Direct lookup of a document ordinal past the end of the corpus.
    #[error("document {index} not found (corpus has {len} documents)")]
    NotFound { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
