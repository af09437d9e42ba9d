//! Character n-gram cosine reranking.
//!
//! The vocabulary is built jointly from the query and every candidate, so a
//! gram missing from one side counts as zero on that side. Vocabulary order
//! is lexical, which keeps the floating-point sums reproducible.

use std::collections::BTreeMap;

use spreadtrace_common::Weighting;

/// Second-stage scorer over a recalled candidate set.
pub trait Reranker: Send + Sync {
    /// One score in `[0, 1]` per candidate, in input order.
    fn score(&self, query: &str, candidates: &[&str]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy)]
pub struct NgramReranker {
    n: usize,
    weighting: Weighting,
}

impl NgramReranker {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            weighting: Weighting::TermFrequency,
        }
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }
}

impl Default for NgramReranker {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Reranker for NgramReranker {
    fn score(&self, query: &str, candidates: &[&str]) -> Vec<f64> {
        similarities(query, candidates, self.n, self.weighting)
    }
}

/// Term-frequency cosine similarity of `query` against each candidate.
pub fn rerank(query: &str, candidates: &[&str], n: usize) -> Vec<f64> {
    similarities(query, candidates, n, Weighting::TermFrequency)
}

/// Overlapping n-grams over Unicode scalar values. Empty if `text` is shorter than `n`.
pub fn char_ngrams(text: &str, n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars.windows(n).map(|w| w.iter().collect()).collect()
}

fn similarities(query: &str, candidates: &[&str], n: usize, weighting: Weighting) -> Vec<f64> {
    let docs: Vec<Vec<String>> = std::iter::once(query)
        .chain(candidates.iter().copied())
        .map(|text| char_ngrams(text, n))
        .collect();

    let mut vocabulary: BTreeMap<&str, usize> = BTreeMap::new();
    for gram in docs.iter().flatten() {
        vocabulary.entry(gram.as_str()).or_insert(0);
    }
    if vocabulary.is_empty() {
        return vec![0.0; candidates.len()];
    }
    for (index, slot) in vocabulary.values_mut().enumerate() {
        *slot = index;
    }

    let mut vectors: Vec<Vec<f64>> = docs
        .iter()
        .map(|grams| {
            let mut v = vec![0.0; vocabulary.len()];
            for gram in grams {
                v[vocabulary[gram.as_str()]] += 1.0;
            }
            v
        })
        .collect();

    if weighting == Weighting::TfIdf {
        apply_idf(&mut vectors);
    }

    let Some((query_vec, candidate_vecs)) = vectors.split_first() else {
        return vec![0.0; candidates.len()];
    };
    candidate_vecs
        .iter()
        .map(|v| cosine_similarity(query_vec, v).clamp(0.0, 1.0))
        .collect()
}

/// Smoothed inverse document frequency: `ln((1 + N) / (1 + df)) + 1`.
fn apply_idf(vectors: &mut [Vec<f64>]) {
    let docs = vectors.len() as f64;
    let terms = vectors.first().map_or(0, Vec::len);
    for t in 0..terms {
        let df = vectors.iter().filter(|v| v[t] > 0.0).count() as f64;
        let idf = ((1.0 + docs) / (1.0 + df)).ln() + 1.0;
        for v in vectors.iter_mut() {
            v[t] *= idf;
        }
    }
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
