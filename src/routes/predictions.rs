//! Prediction endpoints.
//!
//! GET /api/v1/predictions        — latest rule-corrected predictions
//! GET /api/v1/predictions/:date  — prediction for one day
//! GET /api/v1/history            — validated predictions with accuracy stats

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::{blocking, AppState};
use crate::errors::{AppError, ErrorResponse};
use crate::services::history;
use crate::store::files::{load_optional, load_required};
use crate::store::models::{HistoryEntry, HistoryStats, PredictionRecord};

/// Response type for GET /api/v1/history.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub stats: HistoryStats,
    /// Newest first
    pub entries: Vec<HistoryEntry>,
}

/// List the latest predictions.
#[utoipa::path(
    get,
    path = "/api/v1/predictions",
    tag = "Predictions",
    responses(
        (status = 200, description = "Predictions in date order", body = Vec<PredictionRecord>),
        (status = 503, description = "Predict stage has not run yet", body = ErrorResponse),
    )
)]
pub async fn list_predictions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionRecord>>, AppError> {
    let predictions: Vec<PredictionRecord> =
        blocking(move || Ok(load_required(&state.files.predictions())?)).await?;
    Ok(Json(predictions))
}

/// Get the prediction for one day.
#[utoipa::path(
    get,
    path = "/api/v1/predictions/{date}",
    tag = "Predictions",
    params(
        ("date" = String, Path, description = "Day to look up (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "Prediction for the day", body = PredictionRecord),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 404, description = "No prediction for this day", body = ErrorResponse),
    )
)]
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<PredictionRecord>, AppError> {
    let day: NaiveDate = date
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid date '{}': {}", date, e)))?;
    let predictions: Vec<PredictionRecord> =
        blocking(move || Ok(load_required(&state.files.predictions())?)).await?;
    let day = day.to_string();

    predictions
        .into_iter()
        .find(|p| p.date == day)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No prediction for {}", day)))
}

/// Validated predictions and accuracy statistics.
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "Predictions",
    responses(
        (status = 200, description = "Rolling prediction history", body = HistoryResponse),
    )
)]
pub async fn get_history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, AppError> {
    blocking(move || {
        let entries: Vec<HistoryEntry> =
            load_optional(&state.files.prediction_history())?.unwrap_or_default();
        Ok(Json(HistoryResponse {
            stats: history::stats(&entries),
            entries,
        }))
    })
    .await
}
