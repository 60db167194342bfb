use axum::{
  Extension, Json, Router,
  extract::{Path, Query},
  response::sse::{Event, KeepAlive, Sse},
  routing::{get, post},
};
use crawlhub_common::{
  ApiError, ApiResult, DataEnvelope,
  entities::principal::Principal,
  entities::run::{CreateRunInput, Run, UpdateRunStatusInput},
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use crate::api::require_owner;
use crate::{logs, orchestrator};

pub fn router() -> Router {
  Router::new()
    .route("/acts/{id}/runs", post(create_run))
    .route("/actor-runs/{id}", get(get_run).put(update_run_status))
    .route("/actor-runs/{id}/abort", post(abort_run))
    .route("/actor-runs/{id}/resurrect", post(resurrect_run))
    .route("/actor-runs/{id}/logs", get(fetch_logs))
    .route("/actor-runs/{id}/logs/stream", get(stream_logs))
}

async fn create_run(
  Extension(principal): Extension<Principal>,
  Path(actor_id): Path<String>,
  Json(input): Json<CreateRunInput>,
) -> ApiResult<DataEnvelope<Run>> {
  let run = orchestrator::create_run(&actor_id, &principal.id, input).await?;
  Ok(DataEnvelope::new(run))
}

async fn get_run(Path(id): Path<String>) -> ApiResult<DataEnvelope<Run>> {
  let run = orchestrator::get_run(&id).await?;
  Ok(DataEnvelope::new(run))
}

/// `PUT /actor-runs/:id`: trusted internal status update from the
/// container-runtime driver. The calling container authenticates with
/// its own per-run token, which isn't necessarily the
/// owning principal's credential, so this endpoint intentionally skips
/// the ownership check every other mutating route applies.
async fn update_run_status(
  Path(id): Path<String>,
  Json(input): Json<UpdateRunStatusInput>,
) -> ApiResult<DataEnvelope<Run>> {
  let current = orchestrator::get_run(&id).await?;
  let updated = orchestrator::update_status(
    &id,
    current.status,
    input.status,
    input.status_message,
    input.exit_code,
  )
  .await?;
  Ok(DataEnvelope::new(updated))
}

async fn abort_run(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
) -> ApiResult<DataEnvelope<Run>> {
  let existing = orchestrator::get_run(&id).await?;
  require_owner(&principal, &existing.principal_id)?;
  let run = orchestrator::abort_run(&id).await?;
  Ok(DataEnvelope::new(run))
}

async fn resurrect_run(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
) -> ApiResult<DataEnvelope<Run>> {
  let existing = orchestrator::get_run(&id).await?;
  require_owner(&principal, &existing.principal_id)?;
  let run = orchestrator::resurrect_run(&id).await?;
  Ok(DataEnvelope::new(run))
}

#[derive(Debug, Deserialize)]
struct LogPageQuery {
  #[serde(default)]
  offset: usize,
  #[serde(default = "default_log_limit")]
  limit: usize,
}

fn default_log_limit() -> usize {
  200
}

async fn fetch_logs(
  Path(id): Path<String>,
  Query(query): Query<LogPageQuery>,
) -> ApiResult<DataEnvelope<Vec<crawlhub_common::entities::log::LogEntry>>> {
  let entries = logs::fetch(&id, query.offset, query.limit)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(DataEnvelope::new(entries))
}

/// `GET /actor-runs/:id/logs/stream`: upgrades to a Server-Sent-Events
/// channel. Browser contexts authenticate via the `token=` query
/// parameter (handled by `auth::auth_request`, not here); this handler
/// just closes the stream when the client disconnects, which axum's
/// `Sse` does automatically by dropping the underlying stream.
async fn stream_logs(
  Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>> {
  let entries = logs::subscribe(&id)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  let events = entries.map(|entry| {
    Ok(Event::default().json_data(&entry).unwrap_or_else(|_| {
      Event::default().data("failed to encode log entry")
    }))
  });
  Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
