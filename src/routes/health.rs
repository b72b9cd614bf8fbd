use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

/// Presence of one data file.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileStatus {
    /// File name inside the data directory
    pub name: String,
    pub present: bool,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when predictions are available, "degraded" otherwise)
    pub status: String,
    /// API version
    pub version: String,
    /// Data files the API serves from
    pub files: Vec<FileStatus>,
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) until the predict stage has written
/// its output, so load balancers can distinguish partial failures.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let files = &state.files;
    let watched = [
        files.tariff_history(),
        files.model(),
        files.predictions(),
        files.prediction_history(),
    ];
    let statuses: Vec<FileStatus> = watched
        .iter()
        .map(|path| FileStatus {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            present: path.exists(),
        })
        .collect();

    let ready = files.predictions().exists();
    Json(HealthResponse {
        status: if ready {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        files: statuses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::store::files::write_atomic;
    use crate::store::DataFiles;

    #[tokio::test]
    async fn test_health_degraded_without_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            files: DataFiles::new(dir.path()),
            policy: PolicyConfig::default(),
        };
        let Json(body) = health_check(State(state.clone())).await;
        assert_eq!(body.status, "degraded");
        assert!(body.files.iter().all(|f| !f.present));

        write_atomic(&state.files.predictions(), &Vec::<u8>::new()).unwrap();
        let Json(body) = health_check(State(state)).await;
        assert_eq!(body.status, "ok");
        assert!(body
            .files
            .iter()
            .any(|f| f.name == "predictions.json" && f.present));
    }
}
