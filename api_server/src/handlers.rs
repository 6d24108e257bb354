use crate::types::*;
use crate::{ApiError, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Json},
};
use job_orchestrator::entries_from_inputs;
use overlap_core::trades_csv_string;
use solana_client::LedgerClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run an overlap analysis and return the full report
pub async fn run_analysis<L: LedgerClient + 'static>(
    State(state): State<AppState<L>>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let include_trades = request
        .include_trades
        .unwrap_or_else(|| state.engine.include_trades_by_default());

    let entries = entries_from_inputs(request.entries)?;
    info!("Analysis requested for {} token entries", entries.len());

    let report = state
        .engine
        .run(&entries, include_trades, &CancellationToken::new())
        .await?;

    Ok(Json(SuccessResponse::new(report)))
}

/// Run an analysis with trade retention and return the overlap wallets' trades as CSV
pub async fn export_analysis_csv<L: LedgerClient + 'static>(
    State(state): State<AppState<L>>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let entries = entries_from_inputs(request.entries)?;

    let report = state
        .engine
        .run(&entries, true, &CancellationToken::new())
        .await?;

    let csv_content = trades_csv_string(&report.trades)?;
    info!(
        "Exporting {} trade rows for {} overlap wallets",
        report.trades.len(),
        report.wallets.len()
    );

    let headers = [
        (header::CONTENT_TYPE, "text/csv"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"token_transactions.csv\"",
        ),
    ];

    Ok((headers, csv_content))
}
