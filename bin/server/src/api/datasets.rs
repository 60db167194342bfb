use axum::{
  Extension, Json, Router,
  extract::{Path, Query},
  http::HeaderMap,
  response::{IntoResponse, Response},
  routing::post,
};
use crawlhub_common::{ApiResult, DataEnvelope, entities::principal::Principal};
use serde::Deserialize;

use crate::{dataset, storage_alias};

pub fn router() -> Router {
  Router::new().route("/datasets/{id}/items", post(push_items).get(list_items))
}

async fn push_items(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Json(body): Json<serde_json::Value>,
) -> ApiResult<Response> {
  let dataset_id = storage_alias::resolve_or_create_dataset(&principal.id, &id).await?;
  let pushed = dataset::push_items(&dataset_id, body).await?;
  Ok(
    (
      axum::http::StatusCode::CREATED,
      DataEnvelope::new(serde_json::json!({ "itemCount": pushed })),
    )
      .into_response(),
  )
}

#[derive(Debug, Deserialize)]
struct ListItemsQuery {
  #[serde(default)]
  offset: i64,
  #[serde(default = "default_limit")]
  limit: i64,
}

fn default_limit() -> i64 {
  1000
}

async fn list_items(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Query(query): Query<ListItemsQuery>,
) -> ApiResult<Response> {
  let dataset_id = storage_alias::resolve_dataset_id(&principal.id, &id).await?;
  let page = dataset::list_items(&dataset_id, query.offset, query.limit).await?;

  let mut headers = HeaderMap::new();
  headers.insert(
    "x-apify-pagination-total",
    page.total.to_string().parse().unwrap(),
  );
  headers.insert(
    "x-apify-pagination-offset",
    page.offset.to_string().parse().unwrap(),
  );
  headers.insert(
    "x-apify-pagination-limit",
    page.limit.to_string().parse().unwrap(),
  );

  Ok((headers, DataEnvelope::new(page.items)).into_response())
}
