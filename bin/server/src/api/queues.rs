use axum::{
  Extension, Json, Router,
  extract::{Path, Query},
  routing::{get, post},
};
use crawlhub_common::{
  ApiResult, DataEnvelope,
  entities::{
    principal::Principal,
    queue::{AddRequestInput, UpdateRequestPatch},
  },
};
use serde::Deserialize;

use crate::{queue, storage_alias};

pub fn router() -> Router {
  Router::new()
    .route("/request-queues/{id}/requests", post(add_request))
    .route("/request-queues/{id}/requests/batch", post(add_requests_batch))
    .route("/request-queues/{id}/head", get(get_head))
    .route("/request-queues/{id}/head/lock", post(acquire_head))
    .route(
      "/request-queues/{id}/requests/{request_id}/lock",
      axum::routing::put(prolong_lock).delete(release_lock),
    )
    .route(
      "/request-queues/{id}/requests/{request_id}",
      get(get_request).put(update_request),
    )
}

#[derive(Debug, Deserialize)]
struct ForefrontQuery {
  #[serde(default)]
  forefront: bool,
}

async fn add_request(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<ForefrontQuery>,
  Json(input): Json<AddRequestInput>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::queue::AddRequestResult>> {
  let queue_id = storage_alias::resolve_queue_id(&principal.id, &id).await?;
  let result = queue::add_request(&queue_id, input, query.forefront).await?;
  Ok(DataEnvelope::new(result))
}

async fn add_requests_batch(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<ForefrontQuery>,
  Json(inputs): Json<Vec<AddRequestInput>>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::queue::AddRequestsBatchResult>> {
  let queue_id = storage_alias::resolve_queue_id(&principal.id, &id).await?;
  let result = queue::add_requests_batch(&queue_id, inputs, query.forefront).await;
  Ok(DataEnvelope::new(result))
}

#[derive(Debug, Deserialize)]
struct HeadQuery {
  #[serde(default = "default_head_limit")]
  limit: i64,
}

fn default_head_limit() -> i64 {
  100
}

async fn get_head(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<HeadQuery>,
) -> ApiResult<DataEnvelope<Vec<crawlhub_common::entities::queue::Request>>> {
  let queue_id = storage_alias::resolve_queue_id(&principal.id, &id).await?;
  let items = queue::get_head(&queue_id, query.limit).await?;
  Ok(DataEnvelope::new(items))
}

#[derive(Debug, Deserialize)]
struct AcquireHeadQuery {
  #[serde(default = "default_head_limit")]
  limit: i64,
  #[serde(default = "default_lock_secs")]
  lock_secs: i64,
  client_key: String,
}

fn default_lock_secs() -> i64 {
  60
}

async fn acquire_head(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<AcquireHeadQuery>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::queue::AcquireHeadResult>> {
  let queue_id = storage_alias::resolve_queue_id(&principal.id, &id).await?;
  let result = queue::acquire_head(
    &queue_id,
    query.limit,
    query.lock_secs,
    &query.client_key,
  )
  .await?;
  Ok(DataEnvelope::new(result))
}

#[derive(Debug, Deserialize)]
struct LockQuery {
  #[serde(default = "default_lock_secs")]
  lock_secs: i64,
  client_key: String,
}

async fn prolong_lock(
  Path((_id, request_id)): Path<(String, String)>,
  Query(query): Query<LockQuery>,
) -> ApiResult<DataEnvelope<()>> {
  queue::prolong_lock(&request_id, &query.client_key, query.lock_secs).await?;
  Ok(DataEnvelope::new(()))
}

#[derive(Debug, Deserialize)]
struct ReleaseQuery {
  client_key: String,
}

async fn release_lock(
  Path((_id, request_id)): Path<(String, String)>,
  Query(query): Query<ReleaseQuery>,
) -> ApiResult<DataEnvelope<()>> {
  queue::release_lock(&request_id, &query.client_key).await?;
  Ok(DataEnvelope::new(()))
}

async fn get_request(
  Path((_id, request_id)): Path<(String, String)>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::queue::Request>> {
  let request =
    crawlhub_database::helpers::find_one_by_id(&crate::state::db_client().requests, &request_id)
      .await?;
  Ok(DataEnvelope::new(request))
}

#[derive(Debug, Deserialize)]
struct UpdateRequestQuery {
  client_key: Option<String>,
}

async fn update_request(
  Extension(principal): Extension<Principal>,
  Path((id, request_id)): Path<(String, String)>,
  Query(query): Query<UpdateRequestQuery>,
  Json(patch): Json<UpdateRequestPatch>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::queue::Request>> {
  let queue_id = storage_alias::resolve_queue_id(&principal.id, &id).await?;
  let updated =
    queue::update_request(&queue_id, &request_id, patch, query.client_key.as_deref()).await?;
  Ok(DataEnvelope::new(updated))
}
