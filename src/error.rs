//! Document-level errors.
//!
//! Only failures that make the whole document unusable are typed here.
//! Field-level and service-level problems are logged and degrade to empty
//! values inside the mapper instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to load PDF: {0}")]
    PdfLoad(#[source] lopdf::Error),

    #[error("failed to decode content of page {page}: {source}")]
    PageContent {
        page: u32,
        #[source]
        source: lopdf::Error,
    },

    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
