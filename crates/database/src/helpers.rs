use anyhow::Context;
use futures_util::TryStreamExt;
use mongodb::{Collection, bson::{Document, doc, to_document}};
use serde::{Serialize, de::DeserializeOwned};

use crawlhub_common::ApiError;

/// Drains a `coll.find(filter)` cursor fully into a `Vec`.
pub async fn find_collect<T>(
  coll: &Collection<T>,
  filter: Document,
) -> anyhow::Result<Vec<T>>
where
  T: DeserializeOwned + Send + Sync + Unpin,
{
  coll
    .find(filter)
    .await
    .context("query failed")?
    .try_collect()
    .await
    .context("failed to collect cursor")
}

/// Generalization of `mungos::by_id::find_one_by_id`, using our opaque `id`
/// field rather than Mongo's native `_id`.
pub async fn find_one_by_id<T>(
  coll: &Collection<T>,
  id: &str,
) -> Result<T, ApiError>
where
  T: DeserializeOwned + Send + Sync + Unpin,
{
  coll
    .find_one(doc! { "id": id })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
    .ok_or_else(|| ApiError::not_found(format!("id '{id}' not found")))
}

/// Generalization of `mungos::by_id::update_one_by_id` (`Update::Set`
/// variant only — this repo never needs push/pull/inc update variants
/// beyond the dedicated atomic helpers in `runs` and `queues`).
pub async fn update_one_by_id<T>(
  coll: &Collection<T>,
  id: &str,
  set: Document,
) -> anyhow::Result<()>
where
  T: Send + Sync,
{
  coll
    .update_one(doc! { "id": id }, doc! { "$set": set })
    .await
    .context("update_one_by_id failed")?;
  Ok(())
}

pub async fn insert_one<T>(
  coll: &Collection<T>,
  doc: &T,
) -> anyhow::Result<()>
where
  T: Serialize + Send + Sync,
{
  coll.insert_one(doc).await.context("insert_one failed")?;
  Ok(())
}

pub async fn delete_one_by_id<T>(
  coll: &Collection<T>,
  id: &str,
) -> anyhow::Result<()>
where
  T: Send + Sync,
{
  coll
    .delete_one(doc! { "id": id })
    .await
    .context("delete_one_by_id failed")?;
  Ok(())
}

pub fn to_set_doc<T: Serialize>(patch: &T) -> anyhow::Result<Document> {
  to_document(patch).context("failed to serialize patch to bson document")
}
