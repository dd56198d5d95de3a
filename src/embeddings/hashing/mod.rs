#[cfg(test)]
mod tests;

use crate::embeddings::{Embedding, EmbeddingProvider};
use crate::{RagError, Result};

pub const DEFAULT_HASHING_DIMENSION: usize = 384;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Offline embedding provider based on feature hashing.
///
/// Each lower-cased word and each character trigram of a word is hashed into one of
/// `dimension` buckets with a hash-derived sign, and the result is L2-normalised. The hash is
/// FNV-1a, so vectors are identical across processes and builds.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Configuration(
                "Embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    #[inline]
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl EmbeddingProvider for HashingEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            self.accumulate(&mut vector, word.as_bytes(), WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            for trigram in padded.windows(3) {
                let feature: String = trigram.iter().collect();
                self.accumulate(&mut vector, feature.as_bytes(), TRIGRAM_WEIGHT);
            }
        }

        normalize(&mut vector);
        Ok(vector)
    }

    #[inline]
    fn name(&self) -> &str {
        "hashing"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
