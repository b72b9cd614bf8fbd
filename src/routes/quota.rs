//! Quota endpoint.
//!
//! GET /api/v1/quota — days used and remaining per color for a season, from
//! the confirmed tariff history.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{blocking, AppState};
use crate::errors::{AppError, ErrorResponse};
use crate::services::quota::{Quotas, Remaining};
use crate::services::season::Season;
use crate::services::tariff::Color;
use crate::stages::confirmed_tracker;

#[derive(Debug, Deserialize, IntoParams)]
pub struct QuotaQuery {
    /// Any day of the season to report (YYYY-MM-DD). Defaults to the last
    /// confirmed day.
    pub date: Option<String>,
}

/// Days already assigned per color.
#[derive(Debug, Serialize, ToSchema)]
pub struct UsedDays {
    pub blue: usize,
    pub white: usize,
    pub red: usize,
}

/// Response type for GET /api/v1/quota.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaResponse {
    /// Season label, e.g. "2024-2025"
    pub season: String,
    /// Last confirmed day of the tariff history, if any
    pub last_confirmed: Option<String>,
    pub quotas: Quotas,
    pub used: UsedDays,
    pub remaining: Remaining,
}

#[utoipa::path(
    get,
    path = "/api/v1/quota",
    tag = "Quota",
    params(QuotaQuery),
    responses(
        (status = 200, description = "Quota usage for the season", body = QuotaResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 503, description = "Tariff history not fetched yet", body = ErrorResponse),
    )
)]
pub async fn get_quota(
    State(state): State<AppState>,
    Query(params): Query<QuotaQuery>,
) -> Result<Json<QuotaResponse>, AppError> {
    let tracker = blocking(move || confirmed_tracker(&state.files, &state.policy)).await?;

    let date: NaiveDate = match params.date.as_deref() {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::BadRequest(format!("Invalid date '{}': {}", raw, e)))?,
        None => tracker
            .last_date()
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
    };
    let season = Season::of(date);

    Ok(Json(QuotaResponse {
        season: season.to_string(),
        last_confirmed: tracker.last_date().map(|d| d.to_string()),
        quotas: tracker.quotas(),
        used: UsedDays {
            blue: tracker.used(season, Color::Blue),
            white: tracker.used(season, Color::White),
            red: tracker.used(season, Color::Red),
        },
        remaining: tracker.remaining_for(date),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::store::files::write_atomic;
    use crate::store::models::TariffRecord;
    use crate::store::DataFiles;

    fn record(date: &str, color: &str) -> TariffRecord {
        TariffRecord {
            date: Some(date.to_string()),
            color: Some(color.to_string()),
        }
    }

    #[tokio::test]
    async fn test_quota_for_last_confirmed_season() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            files: DataFiles::new(dir.path()),
            policy: PolicyConfig::default(),
        };
        write_atomic(
            &state.files.tariff_history(),
            &vec![
                record("2024-08-30", "bleu"),
                record("2025-01-06", "blanc"),
                record("2025-01-07", "rouge"),
                record("2025-01-08", "rouge"),
            ],
        )
        .unwrap();

        let Json(body) = get_quota(State(state.clone()), Query(QuotaQuery { date: None }))
            .await
            .unwrap();
        assert_eq!(body.season, "2024-2025");
        assert_eq!(body.last_confirmed.as_deref(), Some("2025-01-08"));
        assert_eq!(body.used.red, 2);
        assert_eq!(body.remaining.red, 20);
        assert_eq!(body.remaining.white, 42);
        assert_eq!(body.remaining.blue, 300);

        let Json(previous) = get_quota(
            State(state),
            Query(QuotaQuery {
                date: Some("2024-08-30".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(previous.season, "2023-2024");
        assert_eq!(previous.used.blue, 1);
        assert_eq!(previous.remaining.blue, 299);
    }

    #[tokio::test]
    async fn test_quota_without_history() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            files: DataFiles::new(dir.path()),
            policy: PolicyConfig::default(),
        };
        let err = get_quota(State(state), Query(QuotaQuery { date: None }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
