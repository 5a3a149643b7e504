use dashmap::DashMap;
use recon_model::PatternId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An in-memory vector index over active patterns' embeddings (§4.5). Writers serialize on
/// pattern id; readers are lock-free (§5 "shared resources").
pub struct VectorIndex {
    dimension: usize,
    vectors: DashMap<PatternId, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, vectors: DashMap::new() }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn insert(&self, id: PatternId, vector: Vec<f32>) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch { expected: self.dimension, actual: vector.len() });
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Remove a pattern's vector, e.g. on deactivation (§4.9 step 5).
    pub fn remove(&self, id: &PatternId) {
        self.vectors.remove(id);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The `k` nearest patterns to `query` by cosine similarity, descending (§4.5 `nearest`).
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(PatternId, f32)> {
        let mut scored: Vec<(PatternId, f32)> =
            self.vectors.iter().map(|entry| (entry.key().clone(), cosine_similarity(query, entry.value()))).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}
