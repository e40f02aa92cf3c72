//! Handlers for `/generators/{kind}`.
//!
//! A generator request is admitted as a job and then awaited for up to
//! `GENERATION_WAIT_SECS`. Finished jobs answer 200 with the output fields
//! inlined (`text`, `imageUrl`, `videoUrl`, `content`); jobs still pending
//! answer 202 so the client can poll `/jobs/{id}`.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use goldrush_core::error::CoreError;
use goldrush_core::generation::GenerationKind;
use goldrush_core::job::{Job, JobState};
use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// POST /api/generators/{kind}
pub async fn generate(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<Value>,
) -> AppResult<Response> {
    let kind = GenerationKind::from_slug(&slug)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown generator '{slug}'")))?;

    let engine = &state.engine;
    let job = engine.admission.submit(&auth.context(), kind, payload).await?;

    let wait = Duration::from_secs(state.config.generation_wait_secs);
    let job = engine
        .events
        .await_terminal(engine.stores.jobs.as_ref(), job.id, wait)
        .await?;

    match job.state {
        JobState::Succeeded => Ok((StatusCode::OK, Json(completed_body(&job))).into_response()),
        JobState::Failed => {
            tracing::warn!(
                job_id = job.id,
                reason = job.failure_reason.as_deref().unwrap_or("-"),
                "Generation failed",
            );
            let body = json!({
                "error": "Generation failed",
                "code": "GENERATION_FAILED",
                "jobId": job.id,
                "reason": job.failure_reason,
            });
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
        JobState::Cancelled => Err(AppError::Core(CoreError::Conflict(format!(
            "Job {} was cancelled",
            job.id
        )))),
        JobState::Queued | JobState::Running => {
            let body = json!({
                "jobId": job.id,
                "state": job.state,
                "queuePosition": engine.dispatcher.position(job.id).await,
            });
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
    }
}

/// `{jobId, result, ...result}` for a succeeded job.
fn completed_body(job: &Job) -> Value {
    let mut body = Map::new();
    body.insert("jobId".into(), json!(job.id));
    if let Some(Value::Object(fields)) = &job.result {
        for (key, value) in fields {
            body.insert(key.clone(), value.clone());
        }
    }
    body.insert("result".into(), job.result.clone().unwrap_or(Value::Null));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn completed_body_inlines_output_fields() {
        let now = chrono::Utc::now();
        let job = Job {
            id: 7,
            account_id: 1,
            kind: GenerationKind::Image,
            payload: json!({"prompt": "a cat", "style": "ink"}),
            cost: 20,
            priority: 0,
            reservation_id: Uuid::new_v4(),
            state: JobState::Succeeded,
            attempts: 1,
            result: Some(json!({"imageUrl": "https://example.com/x.jpg"})),
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(
            completed_body(&job),
            json!({
                "jobId": 7,
                "imageUrl": "https://example.com/x.jpg",
                "result": {"imageUrl": "https://example.com/x.jpg"},
            })
        );
    }
}
