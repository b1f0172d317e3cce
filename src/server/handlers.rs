use crate::core::agent_events::{self, AgentLine};
use crate::domain::model::{JobStatus, DEFAULT_JOB_TYPE};
use crate::server::error::{AppError, AppResult};
use crate::server::extract::JsonBody;
use crate::server::state::AppState;
use crate::utils::error::{RelayError, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "agent-relay";

type EventStream = BoxStream<'static, std::result::Result<Event, Infallible>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Deserialize)]
pub struct InvokeAgentRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvokeAgentResponse {
    pub success: bool,
    /// Everything the agent printed.
    pub response: String,
    /// Answer text decoded from the agent's events.
    pub text: String,
    pub prompt: String,
}

pub async fn invoke_agent(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<InvokeAgentRequest>,
) -> AppResult<Json<InvokeAgentResponse>> {
    let prompt = req
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Prompt is required".to_string()))?;

    tracing::info!(prompt_chars = prompt.len(), "Invoking agent");
    let output = state.invoker.invoke(&prompt).await?;
    let text = agent_events::collect_text(&output.stdout);

    Ok(Json(InvokeAgentResponse {
        success: true,
        response: output.stdout,
        text,
        prompt,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    #[serde(default)]
    pub input_text: String,
    #[serde(default)]
    pub job_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub job_type: String,
}

pub async fn submit_job(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SubmitJobRequest>,
) -> AppResult<(StatusCode, Json<SubmitJobResponse>)> {
    let job_type = req
        .job_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string());

    let job = state
        .jobs
        .submit(req.input_text, job_type, state.invoker.clone())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.id,
            status: job.status,
            job_type: job.job_type,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub job_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobStatusResponse>> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(JobStatusResponse {
        job_id: job.id,
        status: job.status,
        job_type: job.job_type,
        created_at: job.created_at,
        updated_at: job.updated_at,
        error: job.error,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobResultResponse>> {
    let job = find_job(&state, &job_id).await?;
    match job.status {
        JobStatus::Completed => Ok(Json(JobResultResponse {
            job_id: job.id,
            status: job.status,
            result: Some(job.result.unwrap_or_default()),
            error: None,
        })),
        JobStatus::Failed => Ok(Json(JobResultResponse {
            job_id: job.id,
            status: job.status,
            result: None,
            error: Some(job.error.unwrap_or_else(|| "Job processing failed".to_string())),
        })),
        JobStatus::Pending | JobStatus::Running => Err(RelayError::JobNotFinished {
            job_id,
            status: job.status.to_string(),
        }
        .into()),
    }
}

async fn find_job(state: &AppState, job_id: &str) -> Result<crate::domain::model::Job> {
    let not_found = || RelayError::NotFound {
        job_id: job_id.to_string(),
    };
    let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;
    state.jobs.get(id).await.ok_or_else(not_found)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    #[serde(default)]
    pub input_text: String,
}

/// Relay the agent's output as `{"chunk"}` frames, ending with `{"done"}` or `{"error"}`.
pub async fn invoke_agent_stream(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StreamRequest>,
) -> AppResult<impl IntoResponse> {
    if req.input_text.trim().is_empty() {
        return Err(AppError::BadRequest("inputText is required".to_string()));
    }

    let events: EventStream = match state.invoker.stream(&req.input_text).await {
        Ok(lines) => agent_events_to_sse(lines).boxed(),
        Err(e) => {
            tracing::warn!(error = %e, "Agent stream could not start");
            stream::iter([error_event(&e)]).boxed()
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn agent_events_to_sse(
    lines: BoxStream<'static, Result<String>>,
) -> impl futures::Stream<Item = std::result::Result<Event, Infallible>> + Send {
    stream::unfold(Some(lines), |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await {
                Some(Ok(line)) => match agent_events::decode_line(&line) {
                    AgentLine::Delta(text) if !text.is_empty() => {
                        return Some((chunk_event(&text), Some(lines)));
                    }
                    AgentLine::Text(text) => {
                        return Some((chunk_event(&format!("{}\n", text)), Some(lines)));
                    }
                    _ => continue,
                },
                Some(Err(e)) => return Some((error_event(&e), None)),
                None => return Some((done_event(), None)),
            }
        }
    })
}

fn frame(value: serde_json::Value) -> std::result::Result<Event, Infallible> {
    Ok(Event::default().data(value.to_string()))
}

fn chunk_event(text: &str) -> std::result::Result<Event, Infallible> {
    frame(json!({ "chunk": text }))
}

fn done_event() -> std::result::Result<Event, Infallible> {
    frame(json!({ "done": true }))
}

fn error_event(err: &RelayError) -> std::result::Result<Event, Infallible> {
    frame(json!({ "error": err.to_string() }))
}
