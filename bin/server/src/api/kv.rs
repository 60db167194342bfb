use axum::{
  Extension, Router,
  body::Bytes,
  extract::{Path, Query},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
  routing::get,
};
use crawlhub_common::{ApiResult, DataEnvelope, entities::principal::Principal};
use serde::Deserialize;

use crate::{kv, storage_alias};

pub fn router() -> Router {
  Router::new()
    .route(
      "/key-value-stores/{id}/records/{key}",
      get(get_record).put(put_record).delete(delete_record),
    )
    .route("/key-value-stores/{id}/keys", get(list_keys))
}

async fn put_record(
  Extension(principal): Extension<Principal>,
  Path((id, key)): Path<(String, String)>,
  headers: HeaderMap,
  body: Bytes,
) -> ApiResult<StatusCode> {
  let store_id = storage_alias::resolve_kv_store_id(&principal.id, &id).await?;
  let content_type = headers
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or("application/octet-stream");
  kv::put(&store_id, &key, body.to_vec(), content_type).await?;
  Ok(StatusCode::OK)
}

async fn get_record(
  Extension(principal): Extension<Principal>,
  Path((id, key)): Path<(String, String)>,
) -> ApiResult<Response> {
  let store_id = storage_alias::resolve_kv_store_id(&principal.id, &id).await?;
  match kv::get(&store_id, &key).await? {
    Some(record) => Ok(
      (
        StatusCode::OK,
        [(header::CONTENT_TYPE, record.content_type)],
        record.body,
      )
        .into_response(),
    ),
    None => Ok(StatusCode::NO_CONTENT.into_response()),
  }
}

async fn delete_record(
  Extension(principal): Extension<Principal>,
  Path((id, key)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
  let store_id = storage_alias::resolve_kv_store_id(&principal.id, &id).await?;
  kv::delete(&store_id, &key).await?;
  Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct ListKeysQuery {
  #[serde(default = "default_limit")]
  limit: usize,
  exclusive_start_key: Option<String>,
}

fn default_limit() -> usize {
  1000
}

async fn list_keys(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<ListKeysQuery>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::kv::KeyListingPage>> {
  let store_id = storage_alias::resolve_kv_store_id(&principal.id, &id).await?;
  let page = kv::list_keys(&store_id, query.limit, query.exclusive_start_key.as_deref()).await?;
  Ok(DataEnvelope::new(page))
}
