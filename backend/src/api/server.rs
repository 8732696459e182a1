//! HTTP server for the reconciliation API.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                        |
//! |--------|-------------------------------|------------------------------------|
//! | GET    | `/health`                     | Health check                       |
//! | POST   | `/api/reconcile`              | Upload two CSVs and reconcile them |
//! | GET    | `/api/reconcile`              | List stored reports                |
//! | GET    | `/api/reconcile/{id}`         | Fetch a report (`?output=`)        |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs      |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method},
    response::{sse::Event, Html, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::html;
use super::logs::{log_info, log_run, log_warning, LogEntry, LOG_BROADCASTER};
use super::types::{Health, ReportQuery, UploadForm};
use crate::config::ServerConfig;
use crate::engine::CancelToken;
use crate::error::{ServerError, ServerResult};
use crate::format::{self, KindChoice, OutputKind, Rendered, ReportListing, CSV_FILENAME};
use crate::models::Report;
use crate::pipeline;
use crate::store::{InMemoryReportStore, ReportStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// State backed by a fresh in-memory store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryReportStore::new()))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn ReportStore>) -> Self {
        Self { store, config: Arc::new(config) }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/reconcile", post(create_report).get(list_reports))
        .route("/api/reconcile/{id}", get(get_report))
        .route("/api/logs", get(sse_logs))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Ledgerdiff server running on http://localhost:{}", config.port);
    println!("   POST /api/reconcile      - Upload source_file + target_file");
    println!("   GET  /api/reconcile      - List reports");
    println!("   GET  /api/reconcile/{{id}} - Fetch a report (?output=json|csv|html)");
    println!("   GET  /api/logs           - SSE log stream");
    println!("   GET  /health             - Health check");
    println!();
    log_info(format!(
        "🔑 Key field '{}', duplicates {}, keyless {}",
        config.reconcile.key_field, config.reconcile.duplicates, config.reconcile.keyless
    ));

    let app = router(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "ledgerdiff",
        version: env!("CARGO_PKG_VERSION"),
        reports: state.store.len(),
    })
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Cancels the run when the request is dropped before the work finishes.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Reconcile two uploaded files and return the new report.
async fn create_report(State(state): State<AppState>, multipart: Multipart) -> ServerResult<Response> {
    let form = read_upload(multipart).await?;
    let (source, target, output_format) = form
        .files()
        .map_err(|missing| ServerError::BadRequest(format!("No file provided: {}", missing.join(", "))))?;

    let run_id = Uuid::new_v4().to_string();
    log_run(
        &run_id,
        LogEntry::info(format!(
            "📄 New reconciliation: source {} bytes, target {} bytes",
            source.len(),
            target.len()
        )),
    );

    let cancel = CancelToken::new();
    let _guard = CancelOnDrop(cancel.clone());
    let store = Arc::clone(&state.store);
    let options = state.config.reconcile.clone();
    let task_run_id = run_id.clone();

    let output = tokio::task::spawn_blocking(move || {
        pipeline::reconcile_bytes(&source, &target, store.as_ref(), &options, &cancel, &task_run_id)
    })
    .await
    .map_err(|e| {
        log_run(&run_id, LogEntry::error(format!("Reconciliation task failed: {}", e)));
        ServerError::Internal(e.to_string())
    })??;

    respond(&output.report, output_format.as_deref(), &state.config.public_url)
}

/// List all stored reports.
async fn list_reports(State(state): State<AppState>) -> Json<ReportListing> {
    Json(format::listing(&state.store.list(), &state.config.public_url))
}

/// Fetch one report in the requested output kind.
async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ServerResult<Response> {
    let report = state.store.get(&id)?;
    respond(&report, query.output.as_deref(), &state.config.public_url)
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "source_file" | "target_file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec();
                if name == "source_file" {
                    form.source_file = Some(bytes);
                } else {
                    form.target_file = Some(bytes);
                }
            }
            "output_format" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                form.output_format = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

fn respond(report: &Report, requested: Option<&str>, base_url: &str) -> ServerResult<Response> {
    let choice = OutputKind::resolve(requested);
    if let KindChoice::Fallback { requested } = &choice {
        log_warning(format!(
            "Unknown output format '{}', using {}",
            requested,
            OutputKind::default()
        ));
    }

    let response = match format::format(report, choice.kind(), base_url)? {
        Rendered::Json(body) => Json(body).into_response(),
        Rendered::Csv(body) => (
            [
                (header::CONTENT_TYPE, OutputKind::Csv.content_type().to_string()),
                (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", CSV_FILENAME)),
            ],
            body,
        )
            .into_response(),
        Rendered::Html(ctx) => Html(html::render(&ctx)).into_response(),
    };

    Ok(response)
}
