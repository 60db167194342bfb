use crawlhub_common::{ApiError, entities::kv::{KeyListingPage, Record}};
use tracing::instrument;

use crate::state::{blob_store, db_client};

fn record_key(kv_store_id: &str, key: &str) -> String {
  format!("key-value-stores/{kv_store_id}/{}", urlencoding::encode(key))
}

/// `Put`: overwrites any existing value at `key`.
#[instrument(skip(body), fields(kv_store_id, key))]
pub async fn put(
  kv_store_id: &str,
  key: &str,
  body: Vec<u8>,
  content_type: &str,
) -> Result<(), ApiError> {
  crawlhub_database::helpers::find_one_by_id(&db_client().key_value_stores, kv_store_id).await?;
  blob_store()
    .put(&record_key(kv_store_id, key), body, content_type)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))
}

/// `Get`: `None` distinguishes "key never set" (204) from "store missing"
/// (404, surfaced by the `find_one_by_id` call failing first).
pub async fn get(kv_store_id: &str, key: &str) -> Result<Option<Record>, ApiError> {
  crawlhub_database::helpers::find_one_by_id(&db_client().key_value_stores, kv_store_id).await?;
  let blob = blob_store()
    .get(&record_key(kv_store_id, key))
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  Ok(blob.map(|b| Record {
    body: b.body,
    content_type: b.content_type,
  }))
}

/// Idempotent: deleting an already-absent key is not an error.
pub async fn delete(kv_store_id: &str, key: &str) -> Result<(), ApiError> {
  crawlhub_database::helpers::find_one_by_id(&db_client().key_value_stores, kv_store_id).await?;
  blob_store()
    .delete(&record_key(kv_store_id, key))
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))
}

/// `ListKeys`: `LocalBlobStore::list` already returns keys in
/// lexicographic order, so pagination here is a plain slice past
/// `exclusiveStartKey` followed by a `limit`-sized cut, matching
/// lexicographic order, with `isTruncated`/`nextExclusiveStartKey` on the
/// response describing where the next page continues.
pub async fn list_keys(
  kv_store_id: &str,
  limit: usize,
  exclusive_start_key: Option<&str>,
) -> Result<KeyListingPage, ApiError> {
  let prefix = format!("key-value-stores/{kv_store_id}");
  let full_keys = blob_store()
    .list(&prefix)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  let mut keys: Vec<String> = full_keys
    .into_iter()
    .filter_map(|full| {
      full
        .strip_prefix(&format!("{prefix}/"))
        .map(|encoded| urlencoding::decode(encoded).unwrap_or_default().into_owned())
    })
    .collect();
  keys.sort();

  Ok(paginate_keys(keys, limit, exclusive_start_key))
}

/// Slices an already-sorted key list into one page past
/// `exclusive_start_key`, reporting whether more keys remain beyond it.
fn paginate_keys(
  mut keys: Vec<String>,
  limit: usize,
  exclusive_start_key: Option<&str>,
) -> KeyListingPage {
  let start = match exclusive_start_key {
    Some(marker) => keys.partition_point(|k| k.as_str() <= marker),
    None => 0,
  };
  let remaining = keys.split_off(start);
  let is_truncated = remaining.len() > limit;
  let page: Vec<String> = remaining.into_iter().take(limit).collect();
  let next_exclusive_start_key = if is_truncated {
    page.last().cloned()
  } else {
    None
  };

  KeyListingPage {
    keys: page,
    is_truncated,
    next_exclusive_start_key,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
  }

  #[test]
  fn first_page_with_more_remaining_is_truncated() {
    let page = paginate_keys(keys(&["a", "b", "c", "d"]), 2, None);
    assert_eq!(page.keys, keys(&["a", "b"]));
    assert!(page.is_truncated);
    assert_eq!(page.next_exclusive_start_key.as_deref(), Some("b"));
  }

  #[test]
  fn continuation_resumes_strictly_after_the_marker() {
    let page = paginate_keys(keys(&["a", "b", "c", "d"]), 2, Some("b"));
    assert_eq!(page.keys, keys(&["c", "d"]));
    assert!(!page.is_truncated);
    assert_eq!(page.next_exclusive_start_key, None);
  }

  #[test]
  fn last_page_is_not_truncated() {
    let page = paginate_keys(keys(&["a", "b"]), 10, None);
    assert_eq!(page.keys, keys(&["a", "b"]));
    assert!(!page.is_truncated);
    assert_eq!(page.next_exclusive_start_key, None);
  }

  #[test]
  fn empty_input_yields_empty_page() {
    let page = paginate_keys(Vec::new(), 10, None);
    assert!(page.keys.is_empty());
    assert!(!page.is_truncated);
  }
}
