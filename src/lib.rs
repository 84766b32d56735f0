//! Eligibility Extractor - dental insurance eligibility PDF parsing and
//! canonical field mapping.

pub mod config;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod fallback;
pub mod kv_rules;
pub mod layout;
pub mod llm;
pub mod projectors;
pub mod raw;
pub mod reconciler;
pub mod schema;
pub mod segmenter;
pub mod similarity;
pub mod tables;

#[cfg(test)]
mod test_support;

pub use error::{ExtractError, Result};
pub use extractor::{parse_pdf, parse_pdf_file, EligibilityExtractor, ParsedDocument};
pub use schema::{CanonicalRecord, Extraction};
