//! Field schema and runtime settings.
//!
//! The canonical field schema is data: target field -> known aliases, with
//! nested groups for coinsurance and frequencies. It is loaded from
//! `SCHEMA_PATH` when present, otherwise the copy compiled into the binary
//! is used.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::embedder::EmbedderKind;
use crate::llm::GeneratorKind;

const BUILTIN_SCHEMA: &str = include_str!("../configs/dental_eligibility.json");

/// Aliases for one canonical field, or for each sub-field of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Aliases(Vec<String>),
    Group(IndexMap<String, Vec<String>>),
}

/// Ordered canonical fields with their aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema {
    fields: IndexMap<String, FieldSpec>,
}

impl FieldSchema {
    /// The dental eligibility schema shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SCHEMA).context("Built-in field schema is invalid")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let schema: FieldSchema =
            serde_json::from_str(content).context("Failed to parse field schema")?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field schema: {:?}", path))?;
        let schema = Self::from_json(&content)
            .with_context(|| format!("Failed to load field schema: {:?}", path))?;
        info!("Loaded field schema ({} fields) from {:?}", schema.len(), path);
        Ok(schema)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in schema.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No field schema at {:?}, using built-in schema", path);
            Self::builtin()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            anyhow::bail!("Field schema has no fields");
        }
        for (name, spec) in &self.fields {
            match spec {
                FieldSpec::Aliases(aliases) if aliases.is_empty() => {
                    anyhow::bail!("Field {} has no aliases", name)
                }
                FieldSpec::Group(subs) if subs.is_empty() => {
                    anyhow::bail!("Group {} has no sub-fields", name)
                }
                FieldSpec::Group(subs) => {
                    if let Some((sub, _)) = subs.iter().find(|(_, a)| a.is_empty()) {
                        anyhow::bail!("Field {}.{} has no aliases", name, sub);
                    }
                }
                FieldSpec::Aliases(_) => {}
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub schema_path: PathBuf,
    pub similarity_threshold: f32,
    pub use_llm: bool,
    pub llm_provider: GeneratorKind,
    pub ollama_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_num_ctx: u32,
    pub llm_timeout: Duration,
    pub embedding_provider: EmbedderKind,
    pub embedding_model: String,
    pub temp_delete_retries: u32,
    pub temp_delete_delay: Duration,
    pub openrouter_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            schema_path: PathBuf::from("configs/dental_eligibility.json"),
            similarity_threshold: 0.6,
            use_llm: true,
            llm_provider: GeneratorKind::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            llm_model: "phi".to_string(),
            llm_temperature: 0.3,
            llm_num_ctx: 4096,
            llm_timeout: Duration::from_secs(60),
            embedding_provider: EmbedderKind::Ollama,
            embedding_model: "all-minilm".to_string(),
            temp_delete_retries: 3,
            temp_delete_delay: Duration::from_millis(500),
            openrouter_api_key: None,
        }
    }
}

impl Settings {
    /// Read settings from the environment, using defaults for unset values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let llm_provider = match get("LLM_PROVIDER") {
            Some(v) => GeneratorKind::from_str(v.trim())
                .with_context(|| format!("Unknown LLM_PROVIDER: {}", v))?,
            None => d.llm_provider,
        };
        let embedding_provider = match get("EMBEDDING_PROVIDER") {
            Some(v) => EmbedderKind::from_str(v.trim())
                .with_context(|| format!("Unknown EMBEDDING_PROVIDER: {}", v))?,
            None => d.embedding_provider,
        };
        let use_llm = match get("USE_LLM") {
            Some(v) => parse_bool(&v).with_context(|| format!("Invalid USE_LLM: {}", v))?,
            None => d.use_llm,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(d.bind_addr),
            schema_path: get("SCHEMA_PATH").map(PathBuf::from).unwrap_or(d.schema_path),
            similarity_threshold: parse_or(
                get("SIMILARITY_THRESHOLD"),
                "SIMILARITY_THRESHOLD",
                d.similarity_threshold,
            )?,
            use_llm,
            llm_provider,
            ollama_url: get("OLLAMA_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(d.ollama_url),
            llm_model: get("LLM_MODEL").unwrap_or(d.llm_model),
            llm_temperature: parse_or(
                get("LLM_TEMPERATURE"),
                "LLM_TEMPERATURE",
                d.llm_temperature,
            )?,
            llm_num_ctx: parse_or(get("LLM_NUM_CTX"), "LLM_NUM_CTX", d.llm_num_ctx)?,
            llm_timeout: Duration::from_secs(parse_or(
                get("LLM_TIMEOUT_SECS"),
                "LLM_TIMEOUT_SECS",
                d.llm_timeout.as_secs(),
            )?),
            embedding_provider,
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(d.embedding_model),
            temp_delete_retries: parse_or(
                get("TEMP_DELETE_RETRIES"),
                "TEMP_DELETE_RETRIES",
                d.temp_delete_retries,
            )?,
            temp_delete_delay: Duration::from_millis(parse_or(
                get("TEMP_DELETE_DELAY_MS"),
                "TEMP_DELETE_DELAY_MS",
                d.temp_delete_delay.as_millis() as u64,
            )?),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", name, v)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
