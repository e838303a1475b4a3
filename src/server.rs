//! HTTP front end: `POST /scrape` plus static access to the output directory.
//!
//! ```text
//! POST /scrape   {"urls": ["https://…", …]}
//!   200  {"message": "Scraping completed successfully!", "file": "output.xlsx"}
//!   400  {"error": "Please provide a valid array of URLs."}
//!   500  {"error": "An error occurred during scraping."}
//! GET  /<file>   anything under the configured output directory
//! ```
//!
//! Batches run one at a time: every batch writes the same artifact path.

use crate::batch::validate_urls;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::output::BatchOutput;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const SUCCESS_MESSAGE: &str = "Scraping completed successfully!";
const FAILURE_MESSAGE: &str = "An error occurred during scraping.";

/// Runs one batch for the server. Swappable so routes can be tested
/// without a browser.
#[async_trait]
pub trait BatchRunner: Send + Sync {
    async fn run(&self, urls: Vec<String>, config: &HarvestConfig) -> Result<BatchOutput, HarvestError>;
}

/// Launches a fresh headless Chrome per batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeRunner;

#[async_trait]
impl BatchRunner for ChromeRunner {
    async fn run(&self, urls: Vec<String>, config: &HarvestConfig) -> Result<BatchOutput, HarvestError> {
        crate::batch::harvest_urls(&urls, config).await
    }
}

#[derive(Clone)]
pub struct ScrapeState {
    config: Arc<HarvestConfig>,
    runner: Arc<dyn BatchRunner>,
    batch_lock: Arc<Mutex<()>>,
}

impl ScrapeState {
    pub fn new(config: HarvestConfig, runner: Arc<dyn BatchRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            batch_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ScrapeOk {
    message: &'static str,
    file: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Build the router: `POST /scrape`, falling back to static files.
pub fn router(state: ScrapeState) -> Router {
    let static_files = ServeDir::new(&state.config.output_dir);
    Router::new()
        .route("/scrape", post(scrape))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, config: HarvestConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Harvest server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(ScrapeState::new(config, Arc::new(ChromeRunner)))).await
}

/// Pull `urls` out of a request body: a non-empty array of non-blank strings.
pub fn parse_url_list(body: &Value) -> Result<Vec<String>, HarvestError> {
    let items = body
        .get("urls")
        .and_then(Value::as_array)
        .ok_or(HarvestError::InvalidInput)?;

    let urls = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or(HarvestError::InvalidInput)?;

    validate_urls(&urls)?;
    Ok(urls)
}

async fn scrape(State(state): State<ScrapeState>, body: Bytes) -> Response {
    let urls = match serde_json::from_slice::<Value>(&body)
        .map_err(|_| HarvestError::InvalidInput)
        .and_then(|v| parse_url_list(&v))
    {
        Ok(urls) => urls,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let _guard = state.batch_lock.lock().await;
    match state.runner.run(urls, &state.config).await {
        Ok(output) => {
            info!(
                "Batch done: {} records, {} skipped",
                output.stats.records,
                output.skipped.len()
            );
            (
                StatusCode::OK,
                Json(ScrapeOk {
                    message: SUCCESS_MESSAGE,
                    file: output.artifact_name,
                }),
            )
                .into_response()
        }
        Err(HarvestError::InvalidInput) => {
            error_response(StatusCode::BAD_REQUEST, HarvestError::InvalidInput.to_string())
        }
        Err(e) => {
            error!("Batch failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, FAILURE_MESSAGE.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}
