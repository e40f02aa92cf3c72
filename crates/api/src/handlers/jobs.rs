//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication. Callers only ever see their own jobs.

use axum::extract::{Path, Query, State};
use axum::Json;
use goldrush_core::error::CoreError;
use goldrush_core::job::Job;
use goldrush_core::store::Page;
use goldrush_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A job with its live queue rank (`null` unless QUEUED and in the queue).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub queue_position: Option<usize>,
}

/// GET /api/jobs
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<Json<DataResponse<Vec<Job>>>> {
    let page = Page::new(params.limit, params.offset);
    let jobs = state
        .engine
        .stores
        .jobs
        .list_by_account(auth.account_id, page)
        .await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<DataResponse<JobView>>> {
    let job = state
        .engine
        .stores
        .jobs
        .get(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    if job.account_id != auth.account_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Cannot view another account's job".into(),
        )));
    }

    let queue_position = state.engine.dispatcher.position(job.id).await;
    Ok(Json(DataResponse {
        data: JobView {
            job,
            queue_position,
        },
    }))
}

/// POST /api/jobs/{id}/cancel
///
/// Only QUEUED jobs can be cancelled; the reservation is refunded.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state.engine.admission.cancel(&auth.context(), job_id).await?;
    Ok(Json(DataResponse { data: job }))
}
