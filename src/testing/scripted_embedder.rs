// src/testing/scripted_embedder.rs
// Deterministic hashing embedder for tests — no network, stable vectors.

use async_trait::async_trait;

use crate::memory::embedder::Embedder;

pub struct ScriptedEmbedder {
    dim: usize,
}

impl ScriptedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for ScriptedEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_ascii_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let idx = (fnv1a32(token.as_bytes()) as usize) % self.dim;
            v[idx] += 1.0;
        }
        l2_normalize(&mut v);
        Ok(v)
    }
}

fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut h: u32 = 2166136261;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let embedder = ScriptedEmbedder::new(32);
        let a = embedder.embed("I love hiking").await.unwrap();
        let b = embedder.embed("I love hiking").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn vector_is_unit_length_when_nonempty() {
        let embedder = ScriptedEmbedder::new(32);
        let v = embedder.embed("distinct tokens here").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_text_yields_zero_vector() {
        let embedder = ScriptedEmbedder::new(16);
        let v = embedder.embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
