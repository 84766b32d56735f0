//! Hybrid reconciler: similarity first, generative fallback for the gaps.
//!
//! The fallback can only fill fields the similarity mapper left missing. A
//! value the similarity mapper found is never replaced.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::{FieldSchema, FieldSpec};
use crate::fallback::FallbackMapper;
use crate::raw::Table;
use crate::schema::{CanonicalRecord, CanonicalValue};
use crate::similarity::SimilarityMapper;

/// Values containing this marker are treated as absent.
const NOT_AVAILABLE: &str = "N/A";

pub struct Reconciler {
    similarity: SimilarityMapper,
    fallback: Option<FallbackMapper>,
}

impl Reconciler {
    pub fn new(similarity: SimilarityMapper, fallback: Option<FallbackMapper>) -> Self {
        Self {
            similarity,
            fallback,
        }
    }

    pub async fn reconcile(
        &self,
        schema: &FieldSchema,
        raw: &IndexMap<String, String>,
        tables: &[Table],
    ) -> CanonicalRecord {
        info!("Starting hybrid field mapping ({} raw keys)", raw.len());
        let mut record = self.similarity.map(schema, raw).await;

        let missing = record.missing_fields();
        debug!("Missing fields before LLM mapping: {:?}", missing);
        match &self.fallback {
            Some(fallback) if !missing.is_empty() => {
                info!("Missing fields for LLM mapping: {}", missing.len());
                let reply = fallback.map(schema, raw, tables).await;
                fill_missing(&mut record, schema, &missing, &reply);
            }
            _ => {}
        }

        normalize(&mut record, schema);
        record
    }
}

/// Copy fallback values into the missing fields only. Within a missing
/// group only empty sub-fields named by the schema are filled.
pub fn fill_missing(
    record: &mut CanonicalRecord,
    schema: &FieldSchema,
    missing: &[String],
    reply: &Map<String, Value>,
) {
    for name in missing {
        let Some(candidate) = reply.get(name) else {
            continue;
        };
        match (record.get_mut(name), schema.get(name)) {
            (Some(CanonicalValue::Text(slot)), _) => {
                if let Some(value) = scalar(candidate) {
                    debug!("LLM filled field {}: {}", name, value);
                    *slot = value;
                }
            }
            (Some(CanonicalValue::Group(group)), Some(FieldSpec::Group(subs))) => {
                let Value::Object(values) = candidate else {
                    continue;
                };
                for sub in subs.keys() {
                    if group.get(sub).map_or(false, |v| !v.is_empty()) {
                        continue;
                    }
                    if let Some(value) = values.get(sub).and_then(scalar) {
                        debug!("LLM filled field {}.{}: {}", name, sub, value);
                        group.insert(sub.clone(), value);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Generated values may be numbers or booleans; the record holds strings.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn clean(value: &str) -> String {
    let value = value.trim();
    if value.contains(NOT_AVAILABLE) {
        String::new()
    } else {
        value.to_string()
    }
}

/// Trim every value, blank out "N/A", and give every group all of its
/// sub-fields in schema order.
pub fn normalize(record: &mut CanonicalRecord, schema: &FieldSchema) {
    for (name, value) in record.iter_mut() {
        match value {
            CanonicalValue::Text(text) => *text = clean(text),
            CanonicalValue::Group(group) => {
                let mut completed: IndexMap<String, String> = match schema.get(name) {
                    Some(FieldSpec::Group(subs)) => subs
                        .keys()
                        .map(|sub| {
                            let value = group.get(sub).map(|v| clean(v)).unwrap_or_default();
                            (sub.clone(), value)
                        })
                        .collect(),
                    _ => IndexMap::new(),
                };
                for (sub, v) in group.iter() {
                    if !completed.contains_key(sub) {
                        completed.insert(sub.clone(), clean(v));
                    }
                }
                *group = completed;
            }
        }
    }
}
