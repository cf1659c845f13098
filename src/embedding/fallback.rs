use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use sha2::{Digest, Sha256};

use super::{EmbeddingProvider, EmbeddingRole};
use crate::config::Number;
use crate::error::ProviderError;
use crate::vector_ops::normalize_vector;

const FALLBACK_STD_DEV: Number = 0.1;

/// Deterministic stand-in embeddings used when the remote provider is down.
///
/// The vector is seeded from a hash of the text, so the same text always maps
/// to the same unit vector. The values carry no meaning: similarity between
/// fallback vectors is noise.
#[derive(Debug, Clone)]
pub struct FallbackEmbedder {
    dimensions: usize,
}

impl FallbackEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

/// First eight bytes of the SHA-256 digest of `text`, little endian.
pub fn stable_seed(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

impl EmbeddingProvider for FallbackEmbedder {
    fn name(&self) -> &str {
        "fallback"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    // The role does not change the vector: queries and documents with the
    // same text must land on the same point.
    fn embed(&self, text: &str, _role: EmbeddingRole) -> Result<Vec<Number>, ProviderError> {
        let normal = Normal::new(0.0, FALLBACK_STD_DEV)
            .map_err(|e| ProviderError::Fallback(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(stable_seed(text));

        let mut vector: Vec<Number> = normal
            .sample_iter(&mut rng)
            .take(self.dimensions)
            .collect();
        normalize_vector(&mut vector);
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_ops::{cosine_similarity, l2_norm};

    #[test]
    fn same_text_gives_bit_identical_vectors() {
        let embedder = FallbackEmbedder::new(768);
        let a = embedder.embed("Employees must badge in.", EmbeddingRole::Document).unwrap();
        let b = embedder.embed("Employees must badge in.", EmbeddingRole::Document).unwrap();
        assert_eq!(a.len(), 768);
        assert_eq!(
            a.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
            b.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn role_does_not_change_the_vector() {
        let embedder = FallbackEmbedder::new(32);
        assert_eq!(
            embedder.embed("same", EmbeddingRole::Document).unwrap(),
            embedder.embed("same", EmbeddingRole::Query).unwrap()
        );
    }

    #[test]
    fn different_texts_give_different_unit_vectors() {
        let embedder = FallbackEmbedder::new(768);
        let a = embedder.embed("Clause 1 applies.", EmbeddingRole::Document).unwrap();
        let b = embedder.embed("Clause 2 applies.", EmbeddingRole::Document).unwrap();
        assert_ne!(a, b);
        assert!((l2_norm(&a) - 1.0).abs() < 1e-4);
        assert!((l2_norm(&b) - 1.0).abs() < 1e-4);
        assert!(cosine_similarity(&a, &b).unwrap() < 0.5);
    }

    #[test]
    fn seed_is_stable() {
        assert_eq!(stable_seed("policy"), stable_seed("policy"));
        assert_ne!(stable_seed("policy"), stable_seed("Policy"));
    }

    #[test]
    fn zero_dimensions_yields_an_empty_vector() {
        let embedder = FallbackEmbedder::new(0);
        assert!(embedder.embed("anything", EmbeddingRole::Document).unwrap().is_empty());
    }
}
