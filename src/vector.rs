//! Sparse TF-IDF term vectors.
//!
//! Weights are `(1 + ln(tf)) * idf(term)`, L2-normalized. Terms are kept in
//! a `BTreeMap` so every sum over a vector runs in the same order.

use crate::document::{count_terms, TermCounts};
use crate::index::FrequencyIndex;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    weights: BTreeMap<String, f64>,
    norm: f64,
}

impl TermVector {
    pub fn get(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    /// L2 norm after normalization: 1 for a non-degenerate vector, else 0.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, &w)| (t.as_str(), w))
    }

    /// Dot product, walking the smaller vector.
    pub fn dot(&self, other: &TermVector) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().map(|(t, w)| w * large.get(t)).sum()
    }
}

/// Sublinear term frequency; zero counts stay zero.
fn sublinear_tf(tf_raw: u32) -> f64 {
    if tf_raw == 0 {
        0.0
    } else {
        1.0 + (tf_raw as f64).ln()
    }
}

fn l2_norm<'a>(weights: impl Iterator<Item = &'a f64>) -> f64 {
    weights.map(|w| w * w).sum::<f64>().sqrt()
}

/// Vectorize a token sequence (document or query).
pub fn vectorize<S: AsRef<str>>(tokens: &[S], index: &mut FrequencyIndex) -> TermVector {
    vectorize_counts(&count_terms(tokens), index)
}

/// Vectorize raw term counts against the index's current IDF values.
pub fn vectorize_counts(counts: &TermCounts, index: &mut FrequencyIndex) -> TermVector {
    let mut weights = BTreeMap::new();
    for (term, &tf_raw) in counts {
        let weight = sublinear_tf(tf_raw) * index.idf(term, false);
        weights.insert(term.clone(), weight);
    }

    let magnitude = l2_norm(weights.values());
    if magnitude == 0.0 {
        return TermVector { weights, norm: 0.0 };
    }
    for weight in weights.values_mut() {
        *weight /= magnitude;
    }
    let norm = l2_norm(weights.values());
    TermVector { weights, norm }
}
