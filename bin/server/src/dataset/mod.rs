use crawlhub_common::{ApiError, entities::dataset::ItemsPage};
use mongodb::bson::doc;
use tracing::instrument;

use crate::state::{blob_store, db_client};

const ITEM_CONTENT_TYPE: &str = "application/json";

fn item_key(dataset_id: &str, index: i64) -> String {
  format!("datasets/{dataset_id}/{index:09}.json")
}

/// `PushItems`: accepts either a single JSON object or an array, appending
/// each as its own immutable, index-named blob. `itemCount` is bumped with
/// an atomic `$inc` so concurrent pushes never clobber each other's index
/// allocation; datasets are append-only.
#[instrument(skip(body), fields(dataset_id))]
pub async fn push_items(dataset_id: &str, body: serde_json::Value) -> Result<i64, ApiError> {
  let items: Vec<serde_json::Value> = match body {
    serde_json::Value::Array(items) => items,
    other => vec![other],
  };
  let count = items.len() as i64;
  if count == 0 {
    return Ok(0);
  }

  let start_index = reserve_item_range(dataset_id, count).await?;

  for (offset, item) in items.into_iter().enumerate() {
    let index = start_index + offset as i64;
    let write = match serde_json::to_vec(&item) {
      Ok(bytes) => blob_store().put(&item_key(dataset_id, index), bytes, ITEM_CONTENT_TYPE).await,
      Err(e) => Err(anyhow::anyhow!(e)),
    };
    if let Err(e) = write {
      // Roll back the reservation so `itemCount` never advances past what's
      // actually persisted. Best-effort compensation, not linearizable
      // against a second concurrent push racing the same failure window.
      release_item_range(dataset_id, count).await;
      return Err(ApiError::PartialWrite(format!(
        "failed to write item at index {index}: {e:#}"
      )));
    }
  }

  Ok(count)
}

/// `ListItems`: a contiguous window over the append-only item sequence,
/// oldest first. `total` reflects `itemCount` on the metadata row, not the
/// number of blobs actually listed, since a caller may request a page past
/// the end.
#[instrument(fields(dataset_id, offset, limit))]
pub async fn list_items(
  dataset_id: &str,
  offset: i64,
  limit: i64,
) -> Result<ItemsPage, ApiError> {
  let dataset =
    crawlhub_database::helpers::find_one_by_id(&db_client().datasets, dataset_id).await?;

  let mut items = Vec::new();
  let end = (offset + limit).min(dataset.item_count);
  for index in offset..end {
    match blob_store()
      .get(&item_key(dataset_id, index))
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
    {
      Some(blob) => {
        let value: serde_json::Value =
          serde_json::from_slice(&blob.body).map_err(|e| ApiError::internal(e.to_string()))?;
        items.push(value);
      }
      None => {
        // A gap would mean a prior push partially failed after reserving
        // its index range; skip it rather than failing the whole page.
        continue;
      }
    }
  }

  Ok(ItemsPage {
    items,
    total: dataset.item_count,
    offset,
    limit,
  })
}

async fn reserve_item_range(dataset_id: &str, count: i64) -> Result<i64, ApiError> {
  let before = db_client()
    .datasets
    .find_one_and_update(
      doc! { "id": dataset_id },
      doc! { "$inc": { "itemCount": count } },
    )
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
    .ok_or_else(|| ApiError::not_found(format!("dataset '{dataset_id}' not found")))?;
  Ok(before.item_count)
}

async fn release_item_range(dataset_id: &str, count: i64) {
  let result = db_client()
    .datasets
    .update_one(
      doc! { "id": dataset_id },
      doc! { "$inc": { "itemCount": -count } },
    )
    .await;
  if let Err(e) = result {
    tracing::error!(
      "failed to roll back itemCount reservation for dataset '{dataset_id}' after partial write | {e:#}"
    );
  }
}
