use anyhow::Context;

use crate::client::Coordination;

/// Per-queue sorted set of pending request ids scored by `orderNo`. This is
/// what `GetHead`/`AcquireHead` scan instead of querying Mongo directly, so
/// ordering and "is pending" stay consistent with whatever the coordination
/// store currently thinks is locked.
fn pending_key(queue_id: &str) -> String {
  format!("queue:{queue_id}:pending")
}

fn clients_key(queue_id: &str) -> String {
  format!("queue:{queue_id}:clients")
}

pub async fn add_pending(
  coord: &Coordination,
  queue_id: &str,
  request_id: &str,
  order_no: i64,
) -> anyhow::Result<()> {
  let mut conn = coord.manager.clone();
  redis::cmd("ZADD")
    .arg(pending_key(queue_id))
    .arg(order_no)
    .arg(request_id)
    .query_async::<i64>(&mut conn)
    .await
    .context("add_pending failed")?;
  Ok(())
}

pub async fn remove_pending(
  coord: &Coordination,
  queue_id: &str,
  request_id: &str,
) -> anyhow::Result<()> {
  let mut conn = coord.manager.clone();
  redis::cmd("ZREM")
    .arg(pending_key(queue_id))
    .arg(request_id)
    .query_async::<i64>(&mut conn)
    .await
    .context("remove_pending failed")?;
  Ok(())
}

/// Oldest-`orderNo`-first request ids, ascending, including negative
/// forefront scores (which sort first by construction).
pub async fn peek_pending(
  coord: &Coordination,
  queue_id: &str,
  limit: i64,
) -> anyhow::Result<Vec<String>> {
  let mut conn = coord.manager.clone();
  let ids: Vec<String> = redis::cmd("ZRANGE")
    .arg(pending_key(queue_id))
    .arg(0)
    .arg(limit - 1)
    .query_async(&mut conn)
    .await
    .context("peek_pending failed")?;
  Ok(ids)
}

/// Records that `client_key` has acquired from this queue. Returns `true`
/// the moment a *second distinct* client key is observed, so the caller
/// can persist the sticky `hadMultipleClients = true` flag on the queue's
/// metadata row exactly once.
pub async fn observe_client_becomes_multiple(
  coord: &Coordination,
  queue_id: &str,
  client_key: &str,
) -> anyhow::Result<bool> {
  let mut conn = coord.manager.clone();
  let added: i64 = redis::cmd("SADD")
    .arg(clients_key(queue_id))
    .arg(client_key)
    .query_async(&mut conn)
    .await
    .context("observe_client sadd failed")?;
  if added == 0 {
    return Ok(false);
  }
  let count: i64 = redis::cmd("SCARD")
    .arg(clients_key(queue_id))
    .query_async(&mut conn)
    .await
    .context("observe_client scard failed")?;
  Ok(count >= 2)
}
