use axum::{
    extract::{Extension, Path},
    Json,
};
use tracing::info;

use crate::services::session::MonitorVerdict;
use crate::state::AppState;
use crate::transcript::{read_entries, TranscriptEntry};
use crate::utils::error::ApiError;

/// Return the full transcript of a session as parsed entries.
pub async fn logs_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    super::validate_session_id(&session_id)?;

    let path = state.transcript_path(&session_id);
    if !path.exists() {
        return Err(ApiError::NotFound(format!(
            "No transcript for session {session_id}"
        )));
    }

    let entries = read_entries(&path)
        .map_err(|e| ApiError::InternalError(format!("Failed to read transcript: {e}")))?;
    Ok(Json(entries))
}

/// Evaluate the session's limit flags against the current transcript. A
/// session whose end flag is raised is evicted from the registry; its
/// transcript file stays on disk.
pub async fn monitor_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<MonitorVerdict>, ApiError> {
    super::validate_session_id(&session_id)?;

    if !state.transcript_path(&session_id).exists() {
        return Err(ApiError::NotFound(format!(
            "No transcript for session {session_id}"
        )));
    }

    let monitor = state.monitor(&session_id);
    let verdict = monitor
        .lock()
        .evaluate()
        .map_err(|e| ApiError::InternalError(format!("Monitor evaluation failed: {e}")))?;

    if verdict.end_flag && state.registry.remove(&session_id).is_some() {
        info!("Session {} reached a limit, removed from registry", session_id);
    }

    Ok(Json(verdict))
}
