pub mod health;
pub mod predictions;
pub mod quota;

use crate::config::PolicyConfig;
use crate::errors::AppError;
use crate::store::DataFiles;

/// Shared state for the read-only HTTP view.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) files: DataFiles,
    pub(crate) policy: PolicyConfig,
}

/// Run file reads and tracker replays on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::InternalError(format!("Blocking task failed: {}", e)))?
}
