//! Text embedding providers.
//!
//! Defines the [`Embedder`] trait used by the similarity mapper. A provider is
//! built once at startup and shared as `Arc<dyn Embedder>`.

pub mod ngram;
pub mod ollama;

use std::sync::Arc;

use crate::config::Settings;

/// Async trait implemented by each embedding backend.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Embed every text, returning one vector per input in the same order.
    async fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Known provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedderKind {
    Ollama,
    Ngram,
}

impl EmbedderKind {
    /// Parse a configuration string into a provider kind.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ollama" => Some(Self::Ollama),
            "ngram" => Some(Self::Ngram),
            _ => None,
        }
    }
}

/// Build the configured embedder.
pub fn from_settings(settings: &Settings, client: reqwest::Client) -> Arc<dyn Embedder> {
    match settings.embedding_provider {
        EmbedderKind::Ollama => Arc::new(ollama::OllamaEmbedder::new(
            client,
            &settings.ollama_url,
            &settings.embedding_model,
        )),
        EmbedderKind::Ngram => Arc::new(ngram::NgramEmbedder::default()),
    }
}

/// Cosine similarity of two vectors. Mismatched, empty or zero-length
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_scale_invariant() {
        let score = cosine_similarity(&[1.0, 1.0], &[3.0, 3.0]);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(EmbedderKind::from_str("ollama"), Some(EmbedderKind::Ollama));
        assert_eq!(EmbedderKind::from_str("ngram"), Some(EmbedderKind::Ngram));
        assert_eq!(EmbedderKind::from_str("bert"), None);
    }
}
