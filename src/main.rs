//! Eligibility Extractor - HTTP server for eligibility PDF parsing.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eligibility_extractor::config::Settings;
use eligibility_extractor::{EligibilityExtractor, Extraction};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractor: Arc<EligibilityExtractor>,
    temp_delete_retries: u32,
    temp_delete_delay: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "eligibility_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let extractor = EligibilityExtractor::from_settings(&settings)?;
    info!("Loaded field schema with {} canonical fields", extractor.schema().len());

    let state = AppState {
        extractor: Arc::new(extractor),
        temp_delete_retries: settings.temp_delete_retries,
        temp_delete_delay: settings.temp_delete_delay,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/parse-pdf", post(parse_pdf))
        .route("/parse-pdf/", post(parse_pdf))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("Server listening on http://{}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// JSON error body with the given status.
fn failure(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "status": "error", "detail": detail }))).into_response()
}

/// Upload an eligibility PDF and return the mapped extraction.
async fn parse_pdf(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Multipart error: {}", e);
                return failure(StatusCode::BAD_REQUEST, "Invalid multipart upload");
            }
        };
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("document.pdf").to_string();
            match field.bytes().await {
                Ok(bytes) => file_data = bytes.to_vec(),
                Err(e) => {
                    warn!("Failed to read upload: {}", e);
                    return failure(StatusCode::BAD_REQUEST, "Failed to read file");
                }
            }
            break;
        }
    }

    if file_data.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "No file uploaded");
    }
    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let path = match persist_upload(&file_data) {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to persist upload: {:#}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process PDF");
        }
    };

    let result = state.extractor.extract_file(&filename, path.clone()).await;
    tokio::spawn(remove_with_retry(
        path,
        state.temp_delete_retries,
        state.temp_delete_delay,
    ));

    match result {
        Ok(extraction) => success(extraction),
        Err(e) => {
            error!("Extraction failed for {}: {}", filename, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process PDF")
        }
    }
}

fn success(extraction: Extraction) -> Response {
    info!("Extraction complete: {}", extraction.id);
    Json(json!({ "status": "success", "data": extraction })).into_response()
}

// ============================================================================
// Temp file handling
// ============================================================================

/// Write the upload to a named `.pdf` temp file that outlives this call.
fn persist_upload(data: &[u8]) -> anyhow::Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("eligibility-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(data)?;
    file.flush()?;
    let path = file.into_temp_path().keep()?;
    Ok(path)
}

/// Delete a temp file, retrying while the file is held elsewhere.
async fn remove_with_retry(path: PathBuf, retries: u32, delay: Duration) {
    for attempt in 1..=retries.max(1) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => return,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Failed to delete {:?} (attempt {}): {}", path, attempt, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
    error!("Giving up on deleting temp file {:?}", path);
}
