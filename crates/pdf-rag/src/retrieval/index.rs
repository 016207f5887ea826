//! In-memory vector index with exact cosine search

use std::cmp::Ordering;

use crate::embeddings::l2_normalize;
use crate::error::{Error, Result};
use crate::types::{RetrievalResult, ScoredSegment, Segment};

#[derive(Debug, Clone)]
struct IndexEntry {
    segment: Segment,
    /// Unit-length copy of the segment's embedding
    vector: Vec<f32>,
}

/// Immutable set of (segment, embedding) pairs for one document.
///
/// Built in one shot; a new document means a new index. Read-only after
/// build, so concurrent searches need no locking.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    model_id: String,
}

impl VectorIndex {
    /// Build an index from embedded segments.
    ///
    /// Fails with `Error::IndexBuild` when there is nothing to index or the
    /// vectors disagree on dimensionality.
    pub fn build(pairs: Vec<(Segment, Vec<f32>)>, model_id: &str) -> Result<Self> {
        let dimensions = match pairs.first() {
            Some((_, vector)) => vector.len(),
            None => return Err(Error::index_build("No segments to index")),
        };
        if dimensions == 0 {
            return Err(Error::index_build("Embeddings are empty"));
        }

        let mut entries = Vec::with_capacity(pairs.len());
        for (segment, mut vector) in pairs {
            if vector.len() != dimensions {
                return Err(Error::index_build(format!(
                    "Segment {} has {} dimensions, expected {}",
                    segment.sequence_index(),
                    vector.len(),
                    dimensions
                )));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(Error::index_build(format!(
                    "Segment {} has a non-finite embedding",
                    segment.sequence_index()
                )));
            }
            l2_normalize(&mut vector);
            entries.push(IndexEntry { segment, vector });
        }

        tracing::debug!(
            "Built vector index: {} segments, {} dims, model {}",
            entries.len(),
            dimensions,
            model_id
        );

        Ok(Self {
            entries,
            dimensions,
            model_id: model_id.to_string(),
        })
    }

    /// Top-`k` segments by cosine similarity, highest first.
    ///
    /// Ties go to the lower `sequence_index`. An empty index, `k == 0` or a
    /// query of the wrong dimensionality yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> RetrievalResult {
        if self.entries.is_empty() || k == 0 {
            return RetrievalResult::empty();
        }
        if query.len() != self.dimensions {
            tracing::warn!(
                "Query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            );
            return RetrievalResult::empty();
        }

        let mut query = query.to_vec();
        l2_normalize(&mut query);

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (dot(&query, &entry.vector), entry))
            .collect();

        scored.sort_by(|(score_a, a), (score_b, b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.segment.sequence_index().cmp(&b.segment.sequence_index()))
        });
        scored.truncate(k);

        RetrievalResult::new(
            scored
                .into_iter()
                .map(|(score, entry)| ScoredSegment {
                    segment: entry.segment.clone(),
                    score,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embedding model the index was built with
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Indexed segments in document order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.entries.iter().map(|e| &e.segment)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two vectors; 0.0 if either has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn seg(i: u32) -> Segment {
        Segment::new(Uuid::nil(), i, format!("segment {}", i), 0, 9)
    }

    #[test]
    fn test_build_empty_fails() {
        assert!(matches!(
            VectorIndex::build(Vec::new(), "m"),
            Err(Error::IndexBuild(_))
        ));
    }

    #[test]
    fn test_build_dimension_mismatch_fails() {
        let pairs = vec![(seg(0), vec![1.0, 0.0]), (seg(1), vec![1.0, 0.0, 0.0])];
        assert!(matches!(
            VectorIndex::build(pairs, "m"),
            Err(Error::IndexBuild(_))
        ));
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let pairs = vec![
            (seg(0), vec![0.0, 1.0]),
            (seg(1), vec![1.0, 0.0]),
            (seg(2), vec![0.7, 0.7]),
        ];
        let index = VectorIndex::build(pairs, "m").unwrap();
        let result = index.search(&[1.0, 0.1], 2);

        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].segment.sequence_index(), 1);
        assert_eq!(result.hits[1].segment.sequence_index(), 2);
        assert!(result.hits[0].score >= result.hits[1].score);
    }

    #[test]
    fn test_ties_break_by_sequence_index() {
        let pairs = vec![
            (seg(3), vec![1.0, 0.0]),
            (seg(1), vec![2.0, 0.0]),
            (seg(2), vec![0.5, 0.0]),
        ];
        let index = VectorIndex::build(pairs, "m").unwrap();
        let order: Vec<u32> = index
            .search(&[1.0, 0.0], 3)
            .iter()
            .map(|h| h.segment.sequence_index())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = VectorIndex::build(vec![(seg(0), vec![1.0]), (seg(1), vec![0.5])], "m").unwrap();
        assert_eq!(index.search(&[1.0], 10).len(), 2);
    }

    #[test]
    fn test_empty_index_and_bad_query() {
        assert!(VectorIndex::default().search(&[1.0], 4).is_empty());

        let index = VectorIndex::build(vec![(seg(0), vec![1.0, 0.0])], "m").unwrap();
        assert!(index.search(&[1.0, 0.0, 0.0], 4).is_empty());
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
