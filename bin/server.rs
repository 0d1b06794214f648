// Customer Profiler - Web Server
// REST API with Axum over the backend reference folder

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use customer_profiler::{
    init_logging, BankSummary, BankTransaction, BackendInventory, Config, CustomerProfile,
    OllamaCli, Session, StepError, Window, Wizard, VERSION,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
struct ServerState {
    wizard: Wizard<OllamaCli>,
    /// One wizard session for the backend-folder customer
    session: Mutex<Session>,
}

type AppState = Arc<ServerState>;

impl ServerState {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

fn step_error_response(err: StepError) -> Response {
    let status = match &err {
        StepError::MissingDocument(_) => StatusCode::NOT_FOUND,
        StepError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error!(error = %err, "Request failed");
    error_response(status, err.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct IdDetailsResponse {
    details: String,
    customer_photo: Option<PathBuf>,
}

#[derive(Serialize)]
struct BankSummaryResponse {
    summary: BankSummary,
    summary_text: String,
    rows: Vec<BankTransaction>,
}

#[derive(Serialize)]
struct ProfileResponse {
    profile: CustomerProfile,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct WindowQuery {
    window: Option<String>,
}

/// Run blocking pipeline work off the async runtime
async fn blocking<T, F>(state: AppState, work: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&ServerState) -> Result<T, StepError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || work(&state)).await {
        Ok(Ok(data)) => ApiResponse::ok(data),
        Ok(Err(e)) => step_error_response(e),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok(HealthResponse {
        status: "OK",
        version: VERSION,
    })
}

/// GET /api/verify-documents - Which expected reference documents exist
async fn verify_documents(State(state): State<AppState>) -> Response {
    blocking(state, |s| -> Result<BackendInventory, StepError> {
        Ok(s.wizard.backend_folder().verify_documents())
    })
    .await
}

/// GET /api/extract-id-details - Identity summary of the backend ID document
async fn extract_id_details(State(state): State<AppState>) -> Response {
    blocking(state, |s| {
        let mut session = s.session();
        s.wizard.use_backend_documents(&mut session)?;
        let details = s.wizard.extract_identity(&mut session)?;
        Ok(IdDetailsResponse {
            details,
            customer_photo: s.wizard.backend_folder().customer_photo(),
        })
    })
    .await
}

/// GET /api/bank-summary?window=total|weekly|monthly
async fn bank_summary(State(state): State<AppState>, Query(query): Query<WindowQuery>) -> Response {
    let window = match query.window.as_deref().map(str::parse::<Window>) {
        None => Window::Total,
        Some(Ok(window)) => window,
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    blocking(state, move |s| {
        let mut session = s.session();
        s.wizard.use_backend_documents(&mut session)?;
        let analysis = s.wizard.bank_analysis(&mut session, window)?;
        Ok(BankSummaryResponse {
            summary_text: analysis.summary_text(),
            summary: analysis.summary,
            rows: analysis.rows,
        })
    })
    .await
}

/// GET /api/generate-customer-profile - Summaries plus the RM narrative
async fn generate_customer_profile(State(state): State<AppState>) -> Response {
    blocking(state, |s| {
        let mut session = s.session();
        s.wizard.use_backend_documents(&mut session)?;
        let report = s.wizard.summarize(&mut session, Window::Total);
        let profile = s.wizard.build_profile(&mut session, Local::now().date_naive())?;
        Ok(ProfileResponse {
            profile,
            warnings: report.warnings,
        })
    })
    .await
}

// ============================================================================
// Main Server
// ============================================================================

fn config_arg() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| a == "--config" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_arg();
    let config = Config::resolve(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.log_dir, &config.log_level, true);

    info!(
        version = VERSION,
        backend = %config.backend_dir.display(),
        model = %config.model.model,
        "Customer Profiler web server starting"
    );

    // Create shared state
    let state: AppState = Arc::new(ServerState {
        wizard: Wizard::from_config(&config),
        session: Mutex::new(Session::new()),
    });

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/verify-documents", get(verify_documents))
        .route("/extract-id-details", get(extract_id_details))
        .route("/bank-summary", get(bank_summary))
        .route("/generate-customer-profile", get(generate_customer_profile))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    info!(bind = %config.server.bind, "Server running; press Ctrl+C to stop");

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
