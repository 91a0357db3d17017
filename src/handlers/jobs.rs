use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};

use crate::errors::ApiError;
use crate::jobs::JobSnapshot;
use crate::AppState;

/// Poll one job's state. Snapshots are taken under a single table guard,
/// so status/progress/last_log are never torn.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .jobs
        .snapshot(&job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))
}

/// Full plain-text transcript of one job.
pub async fn get_job_log(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let transcript = state
        .jobs
        .transcript(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        transcript,
    )
        .into_response())
}
