//! Embedding-similarity field mapper.
//!
//! Every canonical field (and every sub-field of a group) is matched against
//! every raw key through its aliases. The raw key with the best alias score
//! wins if that score is strictly above the threshold.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::{FieldSchema, FieldSpec};
use crate::embedder::{cosine_similarity, Embedder};
use crate::schema::{CanonicalRecord, CanonicalValue};

/// Best raw key for one field: (index into raw keys, score).
///
/// Exhaustive over all alias/raw-key pairs. Only a strictly higher score
/// replaces the current best, so ties keep the earliest pair.
pub fn best_match(aliases: &[Vec<f32>], raw: &[Vec<f32>]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for alias in aliases {
        for (index, key) in raw.iter().enumerate() {
            let score = cosine_similarity(alias, key);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }
    }
    best
}

/// Alias vectors for one target, located in the shared alias batch.
struct Target {
    field: String,
    sub_field: Option<String>,
    aliases: std::ops::Range<usize>,
}

pub struct SimilarityMapper {
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl SimilarityMapper {
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f32) -> Self {
        Self {
            embedder,
            threshold,
        }
    }

    /// Map flat raw pairs onto the schema. Scalars that do not match are
    /// `""`; group sub-fields that do not match are left out.
    pub async fn map(
        &self,
        schema: &FieldSchema,
        raw: &IndexMap<String, String>,
    ) -> CanonicalRecord {
        let mut record = CanonicalRecord::empty_for(schema);
        if raw.is_empty() {
            warn!("No raw keys found for vector mapping");
            return record;
        }

        let raw_keys: Vec<String> = raw.keys().cloned().collect();
        let (targets, alias_texts) = collect_targets(schema);

        let raw_vectors = match self.embedder.encode(&raw_keys).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Embedding raw keys failed ({}): {:#}", self.embedder.name(), e);
                return record;
            }
        };
        let alias_vectors = match self.embedder.encode(&alias_texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Embedding aliases failed ({}): {:#}", self.embedder.name(), e);
                return record;
            }
        };
        if raw_vectors.len() != raw_keys.len() || alias_vectors.len() != alias_texts.len() {
            warn!("Embedder returned the wrong number of vectors");
            return record;
        }

        let mut matched = 0;
        for target in &targets {
            let aliases = &alias_vectors[target.aliases.clone()];
            let Some((index, score)) = best_match(aliases, &raw_vectors) else {
                continue;
            };
            let label = match &target.sub_field {
                Some(sub) => format!("{}.{}", target.field, sub),
                None => target.field.clone(),
            };
            if score <= self.threshold {
                debug!("No match for {} (best {} = {:.3})", label, raw_keys[index], score);
                continue;
            }
            debug!("Mapped {} to {} (score: {:.3})", label, raw_keys[index], score);
            matched += 1;

            let value = raw[index].clone();
            match (&target.sub_field, record.get_mut(&target.field)) {
                (Some(sub), Some(CanonicalValue::Group(group))) => {
                    group.insert(sub.clone(), value);
                }
                (None, Some(slot)) => *slot = CanonicalValue::Text(value),
                _ => {}
            }
        }

        info!(
            "Similarity mapping: {}/{} targets above {}",
            matched,
            targets.len(),
            self.threshold
        );
        record
    }
}

/// Flatten the schema into targets plus one batch of alias strings.
fn collect_targets(schema: &FieldSchema) -> (Vec<Target>, Vec<String>) {
    let mut targets = Vec::new();
    let mut texts = Vec::new();
    let mut push = |field: &str, sub_field: Option<&str>, aliases: &[String]| {
        let start = texts.len();
        texts.extend(aliases.iter().cloned());
        targets.push(Target {
            field: field.to_string(),
            sub_field: sub_field.map(str::to_string),
            aliases: start..texts.len(),
        });
    };
    for (field, spec) in schema.iter() {
        match spec {
            FieldSpec::Aliases(aliases) => push(field, None, aliases),
            FieldSpec::Group(subs) => {
                for (sub, aliases) in subs {
                    push(field, Some(sub), aliases);
                }
            }
        }
    }
    (targets, texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::ngram::NgramEmbedder;
    use std::collections::HashMap;

    /// Looks texts up in a fixed table; unknown texts embed to `fallback`.
    struct StubEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
    }

    #[async_trait::async_trait]
    impl Embedder for StubEmbedder {
        fn name(&self) -> &str {
            "stub"
        }

        async fn encode(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| self.fallback.clone()))
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn encode(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("model server unavailable")
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_best_match_is_exhaustive() {
        let aliases = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let keys = vec![vec![1.0, 1.0], vec![0.0, 1.0]];
        // The second alias finds a perfect match late in the search.
        let (index, score) = best_match(&aliases, &keys).unwrap();
        assert_eq!(index, 1);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_best_match_ties_keep_first_key() {
        let aliases = vec![vec![1.0, 0.0]];
        let keys = vec![vec![2.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(best_match(&aliases, &keys).unwrap().0, 0);
        assert!(best_match(&aliases, &[]).is_none());
    }

    #[tokio::test]
    async fn test_below_threshold_resolves_empty() {
        let schema = FieldSchema::from_json(r#"{"gender": ["Gender"]}"#).unwrap();
        let mut vectors = HashMap::new();
        vectors.insert("Gender".to_string(), vec![1.0, 0.0]);
        // cos = 0.5 for the only raw key: the best score, but too low.
        vectors.insert("Sex Code".to_string(), vec![0.5, 0.866_025_4]);
        let embedder = Arc::new(StubEmbedder {
            vectors,
            fallback: vec![0.0, 1.0],
        });
        let mapper = SimilarityMapper::new(embedder, 0.6);
        let record = mapper.map(&schema, &raw(&[("Sex Code", "F")])).await;
        assert_eq!(record.text("gender"), Some(""));

        let lenient = SimilarityMapper::new(
            Arc::new(StubEmbedder {
                vectors: HashMap::from([
                    ("Gender".to_string(), vec![1.0, 0.0]),
                    ("Sex Code".to_string(), vec![0.5, 0.866_025_4]),
                ]),
                fallback: vec![0.0, 1.0],
            }),
            0.4,
        );
        let record = lenient.map(&schema, &raw(&[("Sex Code", "F")])).await;
        assert_eq!(record.text("gender"), Some("F"));
    }

    #[tokio::test]
    async fn test_maps_scalars_and_groups_with_ngrams() {
        let schema = FieldSchema::builtin().unwrap();
        let mapper = SimilarityMapper::new(Arc::new(NgramEmbedder::default()), 0.6);
        let record = mapper
            .map(
                &schema,
                &raw(&[
                    ("Name", "Jazmin Angel"),
                    ("Plan Type", "DENTAL PPO"),
                    ("Diagnostic and Preventive", "0%"),
                ]),
            )
            .await;
        assert_eq!(record.text("patientName"), Some("Jazmin Angel"));
        assert_eq!(record.text("planType"), Some("DENTAL PPO"));
        assert_eq!(record.group_value("coinsurance", "diagnostic"), Some("0%"));
        assert_eq!(record.group_value("frequencies", "crown"), None);
        assert_eq!(record.len(), schema.len());
    }

    #[tokio::test]
    async fn test_embedding_failure_yields_empty_record() {
        let schema = FieldSchema::builtin().unwrap();
        let mapper = SimilarityMapper::new(Arc::new(FailingEmbedder), 0.6);
        let record = mapper.map(&schema, &raw(&[("Name", "Jazmin Angel")])).await;
        assert_eq!(record.len(), schema.len());
        assert_eq!(record.missing_fields().len(), schema.len());
    }

    #[tokio::test]
    async fn test_no_raw_keys() {
        let schema = FieldSchema::builtin().unwrap();
        let mapper = SimilarityMapper::new(Arc::new(NgramEmbedder::default()), 0.6);
        let record = mapper.map(&schema, &IndexMap::new()).await;
        assert_eq!(record.text("gender"), Some(""));
    }
}
