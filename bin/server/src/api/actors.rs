use axum::{
  Extension, Json, Router,
  extract::Path,
  routing::{get, post},
};
use crawlhub_common::{
  ApiResult, DataEnvelope,
  entities::actor::{CreateActorInput, UpdateActorInput},
  entities::principal::Principal,
};

use crate::actor;
use crate::api::require_owner;

pub fn router() -> Router {
  Router::new()
    .route("/acts", post(create_actor))
    .route(
      "/acts/{id}",
      get(get_actor).patch(update_actor).delete(delete_actor),
    )
}

async fn create_actor(
  Extension(principal): Extension<Principal>,
  Json(input): Json<CreateActorInput>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::actor::Actor>> {
  let created = actor::create_actor(&principal.id, input).await?;
  Ok(DataEnvelope::new(created))
}

async fn get_actor(
  Path(id): Path<String>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::actor::Actor>> {
  let found = actor::get_actor(&id).await?;
  Ok(DataEnvelope::new(found))
}

async fn update_actor(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
  Json(patch): Json<UpdateActorInput>,
) -> ApiResult<DataEnvelope<crawlhub_common::entities::actor::Actor>> {
  let existing = actor::get_actor(&id).await?;
  require_owner(&principal, &existing.owner_id)?;
  let updated = actor::update_actor(&id, &principal.id, patch).await?;
  Ok(DataEnvelope::new(updated))
}

async fn delete_actor(
  Extension(principal): Extension<Principal>,
  Path(id): Path<String>,
) -> ApiResult<DataEnvelope<()>> {
  let existing = actor::get_actor(&id).await?;
  require_owner(&principal, &existing.owner_id)?;
  actor::delete_actor(&id, &principal.id).await?;
  Ok(DataEnvelope::new(()))
}
