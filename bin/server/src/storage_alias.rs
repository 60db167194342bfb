use crawlhub_common::{
  ApiError,
  entities::{dataset::Dataset, kv::KeyValueStore, now_ms, queue::RequestQueue},
  ids::{DEFAULT_ALIAS, generate_id, is_default_alias},
};
use mongodb::bson::doc;

use crate::state::db_client;

/// Resolves `"default"` to the principal-scoped default storage object of
/// the relevant kind, lazily creating it on first use. The auto-creation
/// rule is read here as per-principal, since a global "default" shared
/// across every caller would defeat the per-principal data isolation the
/// rest of the model assumes.
pub async fn resolve_dataset_id(
  owner_id: &str,
  id: &str,
) -> Result<String, ApiError> {
  if !is_default_alias(id) {
    return Ok(id.to_string());
  }
  let coll = &db_client().datasets;
  if let Some(existing) = coll
    .find_one(doc! { "ownerId": owner_id, "name": DEFAULT_ALIAS })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(existing.id);
  }
  let now = now_ms();
  let dataset = Dataset {
    id: generate_id(),
    name: Some(DEFAULT_ALIAS.to_string()),
    owner_id: owner_id.to_string(),
    item_count: 0,
    created_at: now,
    updated_at: now,
  };
  coll
    .insert_one(&dataset)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(dataset.id)
}

/// Datasets auto-create more eagerly than the other two storage kinds:
/// pushing to an absent *named* id creates one with that name, not just
/// the `"default"` alias. Used only by `PushItems`; every other dataset
/// operation should 404 on an unknown id rather than silently create one.
pub async fn resolve_or_create_dataset(
  owner_id: &str,
  id_or_name: &str,
) -> Result<String, ApiError> {
  if is_default_alias(id_or_name) {
    return resolve_dataset_id(owner_id, id_or_name).await;
  }
  let coll = &db_client().datasets;
  if let Some(existing) = coll
    .find_one(doc! { "id": id_or_name })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(existing.id);
  }
  if let Some(existing) = coll
    .find_one(doc! { "ownerId": owner_id, "name": id_or_name })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(existing.id);
  }
  let now = now_ms();
  let dataset = Dataset {
    id: generate_id(),
    name: Some(id_or_name.to_string()),
    owner_id: owner_id.to_string(),
    item_count: 0,
    created_at: now,
    updated_at: now,
  };
  coll
    .insert_one(&dataset)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(dataset.id)
}

pub async fn resolve_kv_store_id(
  owner_id: &str,
  id: &str,
) -> Result<String, ApiError> {
  if !is_default_alias(id) {
    return Ok(id.to_string());
  }
  let coll = &db_client().key_value_stores;
  if let Some(existing) = coll
    .find_one(doc! { "ownerId": owner_id, "name": DEFAULT_ALIAS })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(existing.id);
  }
  let now = now_ms();
  let store = KeyValueStore {
    id: generate_id(),
    name: Some(DEFAULT_ALIAS.to_string()),
    owner_id: owner_id.to_string(),
    created_at: now,
    updated_at: now,
  };
  coll
    .insert_one(&store)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(store.id)
}

pub async fn resolve_queue_id(
  owner_id: &str,
  id: &str,
) -> Result<String, ApiError> {
  if !is_default_alias(id) {
    return Ok(id.to_string());
  }
  let coll = &db_client().request_queues;
  if let Some(existing) = coll
    .find_one(doc! { "ownerId": owner_id, "name": DEFAULT_ALIAS })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(existing.id);
  }
  let now = now_ms();
  let queue = RequestQueue {
    id: generate_id(),
    name: Some(DEFAULT_ALIAS.to_string()),
    owner_id: owner_id.to_string(),
    total_request_count: 0,
    handled_request_count: 0,
    pending_request_count: 0,
    had_multiple_clients: false,
    next_order_no: 0,
    created_at: now,
    updated_at: now,
  };
  coll
    .insert_one(&queue)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(queue.id)
}
