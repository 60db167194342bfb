use anyhow::Context;
use mongodb::{
  Collection,
  bson::doc,
  options::{FindOneAndUpdateOptions, ReturnDocument},
};

use crawlhub_common::entities::queue::{Request, RequestQueue};

/// Atomically reserves the next `orderNo` for a queue, emulating Postgres's
/// `SERIAL`/sequence with Mongo's atomic `$inc`. This is the primitive that
/// gives `AddRequest` its FIFO ordering guarantee even when two clients push
/// concurrently: each caller gets back a distinct, monotonically increasing
/// number before it ever writes the request document.
pub async fn next_order_no(
  queues: &Collection<RequestQueue>,
  queue_id: &str,
) -> anyhow::Result<i64> {
  let options = FindOneAndUpdateOptions::builder()
    .return_document(ReturnDocument::Before)
    .build();

  let before = queues
    .find_one_and_update(
      doc! { "id": queue_id },
      doc! { "$inc": { "nextOrderNo": 1 } },
    )
    .with_options(options)
    .await
    .context("next_order_no failed")?
    .ok_or_else(|| anyhow::anyhow!("queue '{queue_id}' not found"))?;

  Ok(before.next_order_no)
}

/// Inserts a request, relying on the `(queueId, uniqueKey)` unique index
/// created in `Client::ensure_indexes` to reject duplicates atomically —
/// the database itself is the dedup lock, not a read-then-write check in
/// application code, which would race under concurrent `AddRequest` calls
/// for the same `uniqueKey`.
pub async fn try_insert_request(
  requests: &Collection<Request>,
  request: &Request,
) -> anyhow::Result<bool> {
  match requests.insert_one(request).await {
    Ok(_) => Ok(true),
    Err(e) => {
      if is_duplicate_key_error(&e) {
        Ok(false)
      } else {
        Err(e).context("try_insert_request failed")
      }
    }
  }
}

fn is_duplicate_key_error(e: &mongodb::error::Error) -> bool {
  matches!(
    *e.kind,
    mongodb::error::ErrorKind::Write(
      mongodb::error::WriteFailure::WriteError(
        mongodb::error::WriteError { code: 11000, .. }
      )
    )
  )
}
