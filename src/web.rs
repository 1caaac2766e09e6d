// People Import - Web Server
// Upload, browse and geographic lookups over a JSON API

use crate::affiliation::Affiliation;
use crate::browse::{list_affiliations, query_people, PeopleFilter, PeoplePage};
use crate::db::open_connection;
use crate::geo::{GeoService, Region};
use crate::importer::{import, ImportOutcome};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_path: Arc<PathBuf>,
    pub upload_dir: Arc<PathBuf>,
    pub geo: Arc<GeoService>,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn failed(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

/// Handler error: status + message in the usual envelope
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiResponse::failed((), self.1))).into_response()
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError(e.status(), e.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, message.into())
}

/// Run store work on the blocking pool with a fresh connection
async fn with_connection<T, F>(state: &AppState, work: F) -> Result<T, AppError>
where
    F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db_path = state.db_path.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = open_connection(&db_path)?;
        work(&mut conn)
    })
    .await
    .map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| {
        error!("Database error: {:#}", e);
        AppError(StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to load data: {}", e))
    })
}

// ============================================================================
// SCRATCH FILE
// ============================================================================

/// Uploaded spreadsheet on disk, deleted when dropped whatever the outcome
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Unique path under `dir` that keeps the client's base file name
    fn for_upload(dir: &std::path::Path, client_name: &str) -> Self {
        let base = std::path::Path::new(client_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv");
        ScratchFile {
            path: dir.join(format!("{}_{}", uuid::Uuid::new_v4().simple(), base)),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove uploaded file");
            }
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/import - Upload a spreadsheet and import it
///
/// Multipart fields: `csv_file`, `sphere`, `state`, `city`.
async fn upload_import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut sphere = None;
    let mut region = None;
    let mut city = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csv_file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((name, bytes.to_vec()));
            }
            "sphere" => sphere = Some(field.text().await?),
            "state" => region = Some(field.text().await?),
            "city" => city = Some(field.text().await?),
            _ => {}
        }
    }

    let (file_name, bytes) = match file {
        Some((name, bytes)) if !name.is_empty() => (name, bytes),
        _ => return Err(bad_request("No file selected.")),
    };
    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(bad_request("File type not allowed. Please upload a CSV file."));
    }
    let affiliation = Affiliation::from_form(sphere.as_deref(), region.as_deref(), city.as_deref())
        .map_err(|e| bad_request(e.to_string()))?;
    let label = affiliation.label();

    let scratch = ScratchFile::for_upload(&state.upload_dir, &file_name);
    tokio::fs::write(&scratch.path, &bytes).await.map_err(|e| {
        error!(path = %scratch.path.display(), error = %e, "Failed to store upload");
        AppError(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store the uploaded file.".to_string())
    })?;
    info!(file = %file_name, affiliation = %label, bytes = bytes.len(), "Received spreadsheet");

    // The scratch file moves into the blocking task and is removed when it ends
    let outcome: ImportOutcome = with_connection(&state, move |conn| {
        let outcome = import(conn, &scratch.path, &label);
        drop(scratch);
        Ok(outcome)
    })
    .await?;

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let body = if outcome.success {
        ApiResponse::ok(outcome)
    } else {
        let message = outcome.summary.clone();
        ApiResponse::failed(outcome, message)
    };
    Ok((status, Json(body)).into_response())
}

/// GET /api/people - Filtered, paginated people
async fn get_people(
    State(state): State<AppState>,
    Query(filter): Query<PeopleFilter>,
) -> Result<Json<ApiResponse<PeoplePage>>, AppError> {
    let page = with_connection(&state, move |conn| query_people(conn, &filter)).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/affiliations - Labels present in the store
async fn get_affiliations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let labels = with_connection(&state, |conn| list_affiliations(conn)).await?;
    Ok(Json(ApiResponse::ok(labels)))
}

/// GET /api/regions - States (cached)
async fn get_regions(State(state): State<AppState>) -> Response {
    match state.geo.list_regions().await {
        Ok(regions) => (StatusCode::OK, Json(ApiResponse::ok(regions))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::failed(Vec::<Region>::new(), format!("Could not load the state list: {}", e))),
        )
            .into_response(),
    }
}

/// GET /api/regions/:code/localities - Cities of one state
async fn get_localities(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    // Decode URL-encoded code
    let code = urlencoding::decode(&code)
        .map(|c| c.into_owned())
        .unwrap_or(code);

    match state.geo.list_localities(&code).await {
        Ok(cities) => (StatusCode::OK, Json(ApiResponse::ok(cities))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::failed(Vec::<String>::new(), e.to_string())),
        )
            .into_response(),
    }
}

/// GET / - Upload page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /browse - Browse page
async fn serve_browse() -> impl IntoResponse {
    Html(include_str!("../web/browse.html"))
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/import", post(upload_import))
        .route("/people", get(get_people))
        .route("/affiliations", get(get_affiliations))
        .route("/regions", get(get_regions))
        .route("/regions/:code/localities", get(get_localities))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .route("/browse", get(serve_browse))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
