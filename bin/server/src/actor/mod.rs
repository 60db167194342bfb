use crawlhub_common::{
  ApiError,
  entities::actor::{Actor, CreateActorInput, UpdateActorInput},
  entities::now_ms,
  ids::generate_id,
};
use crawlhub_database::helpers::{find_one_by_id, to_set_doc};
use mongodb::bson::doc;
use tracing::instrument;

use crate::state::db_client;

/// Creates (or, for a name an owner already has, replaces the definition
/// of) a deployable Actor: created on first push, mutated by its owner
/// afterward. Build pipelines that would populate the image from source
/// are out of scope; callers supply `defaultRunOptions.image` directly.
#[instrument(skip(input), fields(owner_id))]
pub async fn create_actor(
  owner_id: &str,
  input: CreateActorInput,
) -> Result<Actor, ApiError> {
  if let Some(existing) = db_client()
    .actors
    .find_one(doc! { "ownerId": owner_id, "name": &input.name })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return update_actor(
      &existing.id,
      owner_id,
      UpdateActorInput {
        title: Some(input.title),
        description: Some(input.description),
        default_run_options: Some(input.default_run_options),
      },
    )
    .await;
  }

  let now = now_ms();
  let actor = Actor {
    id: generate_id(),
    name: input.name,
    owner_id: owner_id.to_string(),
    title: input.title,
    description: input.description,
    default_run_options: input.default_run_options,
    created_at: now,
    updated_at: now,
  };

  db_client()
    .actors
    .insert_one(&actor)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  Ok(actor)
}

pub async fn get_actor(actor_id: &str) -> Result<Actor, ApiError> {
  find_one_by_id(&db_client().actors, actor_id).await
}

/// Mutated only by the owning principal. Authorization policy lives with
/// the external collaborator, so the caller is expected to have already
/// checked `owner_id == principal.id` (or delegated that decision to an
/// `Authorizer`) before calling this.
pub async fn update_actor(
  actor_id: &str,
  owner_id: &str,
  patch: UpdateActorInput,
) -> Result<Actor, ApiError> {
  let mut set = doc! { "updatedAt": now_ms() };
  if let Some(title) = patch.title {
    set.insert("title", title);
  }
  if let Some(description) = patch.description {
    set.insert("description", description);
  }
  if let Some(run_options) = patch.default_run_options {
    set.insert(
      "defaultRunOptions",
      to_set_doc(&run_options).map_err(|e| ApiError::internal(e.to_string()))?,
    );
  }

  let updated = db_client()
    .actors
    .find_one_and_update(
      doc! { "id": actor_id, "ownerId": owner_id },
      doc! { "$set": set },
    )
    .with_options(
      mongodb::options::FindOneAndUpdateOptions::builder()
        .return_document(mongodb::options::ReturnDocument::After)
        .build(),
    )
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
    .ok_or_else(|| ApiError::not_found(format!("actor '{actor_id}' not found")))?;

  Ok(updated)
}

/// Deletion never cascades to runs: runs retain a possibly-dangling
/// `actorId` reference so past execution history stays auditable.
pub async fn delete_actor(actor_id: &str, owner_id: &str) -> Result<(), ApiError> {
  let result = db_client()
    .actors
    .delete_one(doc! { "id": actor_id, "ownerId": owner_id })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  if result.deleted_count == 0 {
    return Err(ApiError::not_found(format!("actor '{actor_id}' not found")));
  }
  Ok(())
}
