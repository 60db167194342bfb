use crawlhub_common::{
  ApiError,
  entities::{
    now_ms,
    queue::{
      AcquireHeadResult, AddRequestInput, AddRequestResult, AddRequestsBatchResult, Request,
      UnprocessedRequest, UpdateRequestPatch, derive_unique_key,
    },
  },
  ids::generate_id,
};
use crawlhub_coordination::{locks, queue_index};
use crawlhub_database::{
  helpers::{find_one_by_id, update_one_by_id},
  queues::{next_order_no, try_insert_request},
};
use mongodb::bson::doc;
use tracing::instrument;

use crate::state::{coordination, db_client};

/// `AddRequest`: dedup may merge into an existing row with the same
/// `(queueId, uniqueKey)`; the database's unique index is the arbiter, so
/// concurrent callers racing the same key never insert two distinct rows.
#[instrument(skip(input), fields(queue_id))]
pub async fn add_request(
  queue_id: &str,
  input: AddRequestInput,
  forefront: bool,
) -> Result<AddRequestResult, ApiError> {
  let unique_key = input
    .unique_key
    .clone()
    .unwrap_or_else(|| derive_unique_key(&input.method, &input.url, input.payload.as_deref()));

  if let Some(existing) = db_client()
    .requests
    .find_one(doc! { "queueId": queue_id, "uniqueKey": &unique_key })
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    return Ok(AddRequestResult {
      request_id: existing.id,
      was_already_present: true,
      was_already_handled: existing.handled_at.is_some(),
    });
  }

  let n = next_order_no(&db_client().request_queues, queue_id)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  let order_no = if forefront { -n } else { n };

  let request = Request {
    id: generate_id(),
    queue_id: queue_id.to_string(),
    unique_key,
    url: input.url,
    method: input.method,
    payload: input.payload,
    headers: input.headers,
    user_data: input.user_data,
    retry_count: 0,
    no_retry: false,
    error_messages: Vec::new(),
    handled_at: None,
    order_no,
    locked_until: None,
    locked_by: None,
  };

  let inserted = try_insert_request(&db_client().requests, &request)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  if !inserted {
    // Lost the insert race to a concurrent caller with the same
    // uniqueKey; their row is now authoritative.
    let existing = db_client()
      .requests
      .find_one(doc! { "queueId": queue_id, "uniqueKey": &request.unique_key })
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
      .ok_or_else(|| ApiError::internal("request vanished after dedup race"))?;
    return Ok(AddRequestResult {
      request_id: existing.id,
      was_already_present: true,
      was_already_handled: existing.handled_at.is_some(),
    });
  }

  queue_index::add_pending(coordination(), queue_id, &request.id, order_no)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  bump_queue_counts(queue_id, 1, 0)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  Ok(AddRequestResult {
    request_id: request.id,
    was_already_present: false,
    was_already_handled: false,
  })
}

/// `AddRequestsBatch`: a per-item failure does not abort the batch.
pub async fn add_requests_batch(
  queue_id: &str,
  inputs: Vec<AddRequestInput>,
  forefront: bool,
) -> AddRequestsBatchResult {
  let mut processed = Vec::new();
  let mut unprocessed = Vec::new();

  for input in inputs {
    let url = input.url.clone();
    let method = input.method.clone();
    match add_request(queue_id, input, forefront).await {
      Ok(result) => processed.push(result),
      Err(e) => unprocessed.push(UnprocessedRequest {
        url,
        method,
        error_message: e.to_string(),
      }),
    }
  }

  AddRequestsBatchResult { processed, unprocessed }
}

/// `GetHead`: peek without locking. The pending sorted set isn't updated
/// on lock/unlock (only on handled), so a candidate currently held under
/// an unexpired lease must be filtered out here the same way
/// `acquire_head` filters via its CAS — the coordination store is
/// authoritative for "is this request currently locked".
pub async fn get_head(queue_id: &str, limit: i64) -> Result<Vec<Request>, ApiError> {
  // Overscan since some candidates may be locked and need skipping.
  let candidate_ids = queue_index::peek_pending(coordination(), queue_id, limit * 4)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  let mut ids = Vec::new();
  for request_id in candidate_ids {
    if ids.len() as i64 >= limit {
      break;
    }
    let locked = locks::current_holder(coordination(), &request_id)
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
      .is_some();
    if !locked {
      ids.push(request_id);
    }
  }

  fetch_requests_in_order(&ids).await
}

/// `AcquireHead`: locks up to `limit` pending, unlocked requests. The
/// coordination store is authoritative for "is this request currently
/// locked" — a request can appear in the pending sorted set while
/// actually locked (the set isn't updated on lock/unlock, only on
/// handled), so acquisition itself is the filter.
#[instrument(fields(queue_id, limit, client_key))]
pub async fn acquire_head(
  queue_id: &str,
  limit: i64,
  lock_secs: i64,
  client_key: &str,
) -> Result<AcquireHeadResult, ApiError> {
  // Overscan since some candidates may already be locked by someone else.
  let candidate_ids = queue_index::peek_pending(coordination(), queue_id, limit * 4)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  let mut acquired_ids = Vec::new();
  let mut queue_has_locked_requests = false;
  let now = now_ms();
  let expires_at = now + lock_secs * 1000;

  for request_id in candidate_ids {
    if acquired_ids.len() as i64 >= limit {
      break;
    }
    let got = locks::acquire(coordination(), &request_id, client_key, lock_secs)
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
    if got {
      acquired_ids.push(request_id.clone());
      let _ = update_one_by_id(
        &db_client().requests,
        &request_id,
        doc! { "lockedUntil": expires_at, "lockedBy": client_key },
      )
      .await;
    } else {
      queue_has_locked_requests = true;
    }
  }

  // `observe_client_becomes_multiple` only reports `true` on the single
  // call that first crosses the 2-distinct-clients threshold; every call
  // after that from an already-seen client key reports `false` again.
  // `hadMultipleClients` is sticky per spec, so OR that transient
  // observation into the queue's persisted flag rather than returning it
  // on its own.
  let newly_multiple = queue_index::observe_client_becomes_multiple(
    coordination(),
    queue_id,
    client_key,
  )
  .await
  .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  if newly_multiple {
    let _ = update_one_by_id(
      &db_client().request_queues,
      queue_id,
      doc! { "hadMultipleClients": true },
    )
    .await;
  }
  let queue = find_one_by_id(&db_client().request_queues, queue_id).await?;
  let had_multiple_clients = queue.had_multiple_clients || newly_multiple;

  let items = fetch_requests_in_order(&acquired_ids).await?;

  Ok(AcquireHeadResult {
    items,
    queue_has_locked_requests,
    had_multiple_clients,
    lock_expires_at: expires_at,
  })
}

/// `ProlongLock`: fails `NOT_LOCK_OWNER` if `clientKey` doesn't match.
pub async fn prolong_lock(
  request_id: &str,
  client_key: &str,
  lock_secs: i64,
) -> Result<(), ApiError> {
  let ok = locks::prolong(coordination(), request_id, client_key, lock_secs)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  if !ok {
    return Err(ApiError::NotLockOwner(format!(
      "'{client_key}' does not hold the lease on '{request_id}'"
    )));
  }
  let expires_at = now_ms() + lock_secs * 1000;
  let _ = update_one_by_id(
    &db_client().requests,
    request_id,
    doc! { "lockedUntil": expires_at, "lockedBy": client_key },
  )
  .await;
  Ok(())
}

/// `ReleaseLock`: same ownership check, clears the lease.
pub async fn release_lock(request_id: &str, client_key: &str) -> Result<(), ApiError> {
  let ok = locks::release(coordination(), request_id, client_key)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  if !ok {
    return Err(ApiError::NotLockOwner(format!(
      "'{client_key}' does not hold the lease on '{request_id}'"
    )));
  }
  let _ = update_one_by_id(
    &db_client().requests,
    request_id,
    doc! { "lockedUntil": mongodb::bson::Bson::Null, "lockedBy": mongodb::bson::Bson::Null },
  )
  .await;
  Ok(())
}

/// `UpdateRequest`: if currently locked and `clientKey` differs from the
/// holder, fails `LOCKED_BY_OTHER`. Clearing the lease is implicit on a
/// successful update. Transitioning `handledAt` from null updates the
/// queue's counters.
pub async fn update_request(
  queue_id: &str,
  request_id: &str,
  patch: UpdateRequestPatch,
  client_key: Option<&str>,
) -> Result<Request, ApiError> {
  let request = find_one_by_id(&db_client().requests, request_id).await?;

  if let Some(holder) = locks::current_holder(coordination(), request_id)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  {
    if Some(holder.as_str()) != client_key {
      return Err(ApiError::LockedByOther(format!(
        "request is locked by '{holder}'"
      )));
    }
  }

  let was_pending = request.handled_at.is_none();
  let mut set = doc! {};
  if let Some(handled_at) = patch.handled_at {
    set.insert("handledAt", handled_at);
  }
  if let Some(retry_count) = patch.retry_count {
    set.insert("retryCount", retry_count);
  }
  if let Some(error_messages) = patch.error_messages {
    set.insert("errorMessages", error_messages);
  }
  if let Some(user_data) = patch.user_data {
    set.insert(
      "userData",
      mongodb::bson::to_bson(&user_data)
        .map_err(|e| ApiError::internal(e.to_string()))?,
    );
  }
  if let Some(no_retry) = patch.no_retry {
    set.insert("noRetry", no_retry);
  }
  set.insert("lockedUntil", mongodb::bson::Bson::Null);
  set.insert("lockedBy", mongodb::bson::Bson::Null);

  update_one_by_id(&db_client().requests, request_id, set)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  if let Some(client_key) = client_key {
    locks::release(coordination(), request_id, client_key)
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  }

  let now_handled = patch.handled_at.is_some();
  if was_pending && now_handled {
    queue_index::remove_pending(coordination(), queue_id, request_id)
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
    bump_queue_counts(queue_id, 0, 1)
      .await
      .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  }

  find_one_by_id(&db_client().requests, request_id).await
}

async fn fetch_requests_in_order(ids: &[String]) -> Result<Vec<Request>, ApiError> {
  if ids.is_empty() {
    return Ok(Vec::new());
  }
  let found = crawlhub_database::helpers::find_collect(
    &db_client().requests,
    doc! { "id": { "$in": ids } },
  )
  .await
  .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  let mut by_id: std::collections::HashMap<String, Request> =
    found.into_iter().map(|r| (r.id.clone(), r)).collect();
  Ok(
    ids
      .iter()
      .filter_map(|id| by_id.remove(id))
      .collect(),
  )
}

/// Keeps `totalRequestCount`/`pendingRequestCount`/`handledRequestCount`
/// consistent with `pending = total - handled`.
async fn bump_queue_counts(
  queue_id: &str,
  total_delta: i64,
  handled_delta: i64,
) -> anyhow::Result<()> {
  db_client()
    .request_queues
    .update_one(
      doc! { "id": queue_id },
      doc! { "$inc": {
        "totalRequestCount": total_delta,
        "handledRequestCount": handled_delta,
        "pendingRequestCount": total_delta - handled_delta,
      } },
    )
    .await?;
  Ok(())
}
