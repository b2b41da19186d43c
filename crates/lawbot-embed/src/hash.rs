use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use lawbot_core::traits::Embedder;
use lawbot_core::ProviderError;

/// Offline embedder for tests and dry runs.
///
/// Hashes character unigrams and bigrams (whitespace and punctuation
/// dropped) into a fixed number of buckets and L2-normalizes the result, so
/// texts sharing many characters land close together under cosine distance.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("hash:d{}", dim.max(1)) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let chars: Vec<char> = text.chars().filter(|c| c.is_alphanumeric()).collect();
        let mut v = vec![0f32; self.dim];
        for c in &chars {
            self.add_feature(&mut v, c, 1.0);
        }
        for pair in chars.windows(2) {
            self.add_feature(&mut v, &(pair[0], pair[1]), 1.5);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    fn add_feature<T: Hash + ?Sized>(&self, v: &mut [f32], feature: &T, weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
