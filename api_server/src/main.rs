use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config_manager::SystemConfig;
use job_orchestrator::{AnalysisEngine, OrchestratorError};
use overlap_core::CoreError;
use solana_client::{LedgerClient, SolanaRpcClient};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

mod handlers;
mod types;

use handlers::*;
use types::*;

/// Application state shared across handlers
pub struct AppState<L: LedgerClient> {
    pub engine: Arc<AnalysisEngine<L>>,
}

impl<L: LedgerClient> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("Export error: {0}")]
    Export(#[from] CoreError),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Orchestrator(OrchestratorError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Orchestrator(OrchestratorError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Orchestrator(_) | ApiError::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            timestamp: chrono::Utc::now(),
        });

        (status, body).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_server=debug,job_orchestrator=debug".into()),
        )
        .init();

    info!("Starting overlap scanner API server...");

    let config = SystemConfig::load()?;
    info!("Configuration loaded successfully");

    let engine: Arc<AnalysisEngine<SolanaRpcClient>> =
        Arc::new(AnalysisEngine::from_config(&config)?);
    info!(
        "Analysis engine initialized with {} DEX programs",
        config.dex.program_ids.len()
    );

    let app_state = AppState { engine };

    let app = create_router(app_state);

    info!("📋 Available endpoints:");
    info!("   • GET /health - Health check");
    info!("   • POST /api/analysis - Overlap wallets for a list of token entries");
    info!("   • POST /api/analysis/export.csv - Trade rows of overlap wallets as CSV");

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router<L: LedgerClient + 'static>(state: AppState<L>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/analysis", post(run_analysis::<L>))
        .route("/api/analysis/export.csv", post(export_analysis_csv::<L>))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}
