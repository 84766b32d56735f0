//! Document extraction pipeline.
//!
//! Two stages:
//! - parse (blocking, CPU bound): bytes -> pages -> raw sections + tables
//! - map (async, talks to model servers): raw data -> canonical record

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::{FieldSchema, Settings};
use crate::embedder::{self, Embedder};
use crate::error::{ExtractError, Result};
use crate::fallback::FallbackMapper;
use crate::layout::{self, PageText};
use crate::llm::{self, GenerationOptions, TextGenerator};
use crate::projectors;
use crate::raw::{RawSections, Table};
use crate::reconciler::Reconciler;
use crate::schema::{CanonicalRecord, Extraction};
use crate::segmenter;
use crate::similarity::SimilarityMapper;
use crate::tables;

/// Everything read from the PDF itself, before any mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub content_hash: String,
    pub total_pages: u32,
    pub raw: RawSections,
    pub tables: Vec<Table>,
    pub full_text: String,
}

impl ParsedDocument {
    /// The flat `label -> value` view the mappers work on.
    pub fn flat_fields(&self) -> IndexMap<String, String> {
        self.raw.flatten()
    }
}

/// Parse PDF bytes. Fails only if the document itself cannot be read.
pub fn parse_pdf(data: &[u8]) -> Result<ParsedDocument> {
    let content_hash = {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("{:x}", hasher.finalize())
    };

    let pages = layout::extract_pages(data)?;
    let raw = segmenter::segment_pages(&pages);
    let tables: Vec<Table> = pages
        .iter()
        .flat_map(|page| tables::extract_page_tables(&page.lines))
        .collect();

    info!(
        "Parsed {} pages: {} sections, {} tables",
        pages.len(),
        raw.len(),
        tables.len()
    );
    if raw.is_empty() {
        warn!("No key/value pairs found; the PDF may have no text layer");
    }

    Ok(ParsedDocument {
        content_hash,
        total_pages: pages.len() as u32,
        raw,
        tables,
        full_text: full_text(&pages),
    })
}

/// Read and parse a PDF file.
pub fn parse_pdf_file(path: &Path) -> Result<ParsedDocument> {
    let data = std::fs::read(path)?;
    parse_pdf(&data)
}

fn full_text(pages: &[PageText]) -> String {
    pages
        .iter()
        .flat_map(|page| page.blocks.iter().map(|b| b.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extraction pipeline orchestrator.
pub struct EligibilityExtractor {
    schema: FieldSchema,
    reconciler: Reconciler,
}

impl EligibilityExtractor {
    pub fn new(
        schema: FieldSchema,
        embedder: Arc<dyn Embedder>,
        generator: Option<Arc<dyn TextGenerator>>,
        settings: &Settings,
    ) -> Self {
        let similarity = SimilarityMapper::new(embedder, settings.similarity_threshold);
        let fallback = generator.map(|g| {
            FallbackMapper::new(
                g,
                GenerationOptions {
                    temperature: settings.llm_temperature,
                    max_context: settings.llm_num_ctx,
                },
            )
        });
        Self {
            schema,
            reconciler: Reconciler::new(similarity, fallback),
        }
    }

    /// Build the schema and service clients described by `settings`.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let schema = FieldSchema::load_or_builtin(&settings.schema_path)?;
        let embedder = embedder::from_settings(settings, reqwest::Client::new());
        let generator = llm::from_settings(settings)?;
        info!(
            "Extractor ready: embedder={}, threshold={}, fallback={}",
            embedder.name(),
            settings.similarity_threshold,
            generator.as_ref().map(|g| g.name()).unwrap_or("disabled")
        );
        Ok(Self::new(schema, embedder, generator, settings))
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// Map a parsed document onto the canonical schema.
    pub async fn map(&self, parsed: &ParsedDocument) -> CanonicalRecord {
        let flat = parsed.flat_fields();
        debug!("Raw keys for mapping: {:?}", flat.keys().collect::<Vec<_>>());
        self.reconciler
            .reconcile(&self.schema, &flat, &parsed.tables)
            .await
    }

    /// Full pipeline over in-memory bytes.
    pub async fn extract(&self, filename: &str, data: Vec<u8>) -> Result<Extraction> {
        let parsed = tokio::task::spawn_blocking(move || parse_pdf(&data))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))??;
        Ok(self.finish(filename, parsed).await)
    }

    /// Full pipeline over a file on disk.
    pub async fn extract_file(&self, filename: &str, path: PathBuf) -> Result<Extraction> {
        let parsed = tokio::task::spawn_blocking(move || parse_pdf_file(&path))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))??;
        Ok(self.finish(filename, parsed).await)
    }

    async fn finish(&self, filename: &str, parsed: ParsedDocument) -> Extraction {
        info!(
            "Mapping {} ({} pages, {} chars)",
            filename,
            parsed.total_pages,
            parsed.full_text.len()
        );
        let mapped = self.map(&parsed).await;

        let mut extraction = Extraction::new(filename.to_string(), parsed.content_hash);
        extraction.total_pages = parsed.total_pages;
        extraction.normalized = projectors::project(&parsed.raw);
        extraction.mapped_fields = mapped;
        extraction.raw_data = parsed.raw;
        extraction.tables = parsed.tables;
        extraction.full_text = parsed.full_text;
        info!(
            "Extraction {} complete: {} of {} fields resolved",
            extraction.id,
            extraction.mapped_fields.len() - extraction.mapped_fields.missing_fields().len(),
            extraction.mapped_fields.len()
        );
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::ngram::NgramEmbedder;
    use crate::test_support::{build_multi_page_pdf, build_pdf, page_lines};

    fn offline_extractor() -> EligibilityExtractor {
        EligibilityExtractor::new(
            FieldSchema::builtin().unwrap(),
            Arc::new(NgramEmbedder::default()),
            None,
            &Settings::default(),
        )
    }

    fn sample_pdf() -> Vec<u8> {
        build_pdf(page_lines(&[
            "PATIENT DETAIL",
            "Name: Jazmin Angel",
            "PLAN AND NETWORK",
            "Plan Type: DENTAL PPO",
        ]))
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let extraction = offline_extractor()
            .extract("eligibility.pdf", sample_pdf())
            .await
            .unwrap();

        assert_eq!(extraction.total_pages, 1);
        assert_eq!(extraction.normalized.patient_info.name, "Jazmin Angel");
        assert_eq!(extraction.normalized.plan_info.plan_type, "DENTAL PPO");
        assert_eq!(extraction.mapped_fields.text("patientName"), Some("Jazmin Angel"));
        assert_eq!(extraction.mapped_fields.text("planType"), Some("DENTAL PPO"));
        assert!(extraction.full_text.contains("Jazmin Angel"));
        assert_eq!(extraction.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_every_canonical_key_present() {
        let extractor = offline_extractor();
        let extraction = extractor.extract("x.pdf", sample_pdf()).await.unwrap();
        let json = serde_json::to_value(&extraction.mapped_fields).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), extractor.schema().len());
        for (name, value) in object {
            assert!(value.is_string() || value.is_object(), "{} is {:?}", name, value);
        }
        assert_eq!(object["coinsurance"].as_object().unwrap().len(), 4);
        assert_eq!(object["frequencies"].as_object().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_extraction_is_idempotent() {
        let extractor = offline_extractor();
        let first = extractor.extract("a.pdf", sample_pdf()).await.unwrap();
        let second = extractor.extract("a.pdf", sample_pdf()).await.unwrap();
        assert_eq!(first.raw_data, second.raw_data);
        assert_eq!(first.mapped_fields, second.mapped_fields);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn test_multi_line_benefit_key_across_layout() {
        let pdf = build_pdf(page_lines(&[
            "Benefits",
            "Individual Calendar Year",
            "Deductible",
            "  Remaining: $50.00",
        ]));
        let parsed = parse_pdf(&pdf).unwrap();
        let flat = parsed.flat_fields();
        assert_eq!(flat["Individual Calendar Year Deductible Remaining"], "$50.00");
    }

    #[test]
    fn test_sections_continue_across_pages() {
        let pdf = build_multi_page_pdf(vec![
            page_lines(&["PLAN DETAILS", "Diagnostic and Preventive  0%"]),
            page_lines(&["Basic Restorative  20%"]),
        ]);
        let parsed = parse_pdf(&pdf).unwrap();
        assert_eq!(parsed.total_pages, 2);
        let details = parsed.raw.section("Plan Details").unwrap();
        assert_eq!(details["Diagnostic and Preventive"].as_text(), Some("0%"));
        assert_eq!(details["Basic Restorative"].as_text(), Some("20%"));
    }

    #[test]
    fn test_pdf_without_text_parses_empty() {
        let parsed = parse_pdf(&build_pdf(Vec::new())).unwrap();
        assert_eq!(parsed.total_pages, 1);
        assert!(parsed.raw.is_empty());
        assert!(parsed.tables.is_empty());
        assert!(parsed.full_text.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_fatal() {
        let result = offline_extractor().extract("bad.pdf", b"%PDF-garbage".to_vec()).await;
        assert!(matches!(result, Err(ExtractError::PdfLoad(_))));
    }

    #[tokio::test]
    async fn test_extract_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.pdf");
        std::fs::write(&path, sample_pdf()).unwrap();
        let extraction = offline_extractor()
            .extract_file("upload.pdf", path)
            .await
            .unwrap();
        assert_eq!(extraction.source_file, "upload.pdf");
        assert_eq!(extraction.mapped_fields.text("patientName"), Some("Jazmin Angel"));

        let missing = offline_extractor()
            .extract_file("gone.pdf", dir.path().join("gone.pdf"))
            .await;
        assert!(matches!(missing, Err(ExtractError::Io(_))));
    }

    #[test]
    fn test_from_settings_offline() {
        let settings = Settings {
            use_llm: false,
            embedding_provider: crate::embedder::EmbedderKind::Ngram,
            schema_path: PathBuf::from("does/not/exist.json"),
            ..Settings::default()
        };
        let extractor = EligibilityExtractor::from_settings(&settings).unwrap();
        assert_eq!(extractor.schema(), &FieldSchema::builtin().unwrap());
    }
}
