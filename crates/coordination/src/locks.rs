use anyhow::Context;
use redis::Script;

use crate::client::Coordination;

/// Lease lock over a single request, keyed by request id: `(clientKey,
/// deadline)` under an atomic CAS primitive. Acquire/prolong/release are
/// Lua scripts so the check-then-mutate never splits into two round
/// trips.
fn lock_key(request_id: &str) -> String {
  format!("lock:{request_id}")
}

/// `SET key clientKey NX PX lockSecs*1000` — succeeds only if no lease
/// currently exists, which is exactly the acquire semantics: "succeed
/// only if no current lease exists".
pub async fn acquire(
  coord: &Coordination,
  request_id: &str,
  client_key: &str,
  lock_secs: i64,
) -> anyhow::Result<bool> {
  let mut conn = coord.manager.clone();
  let reply: Option<String> = redis::cmd("SET")
    .arg(lock_key(request_id))
    .arg(client_key)
    .arg("NX")
    .arg("PX")
    .arg(lock_secs * 1000)
    .query_async(&mut conn)
    .await
    .context("lock acquire failed")?;
  Ok(reply.is_some())
}

const PROLONG_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Extends the lease to `now + lockSecs`, failing silently (returns
/// `false`) if `client_key` is not the current holder — the caller maps
/// that to `NOT_LOCK_OWNER` (409).
pub async fn prolong(
  coord: &Coordination,
  request_id: &str,
  client_key: &str,
  lock_secs: i64,
) -> anyhow::Result<bool> {
  let mut conn = coord.manager.clone();
  let ok: i64 = Script::new(PROLONG_SCRIPT)
    .key(lock_key(request_id))
    .arg(client_key)
    .arg(lock_secs * 1000)
    .invoke_async(&mut conn)
    .await
    .context("lock prolong failed")?;
  Ok(ok == 1)
}

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

pub async fn release(
  coord: &Coordination,
  request_id: &str,
  client_key: &str,
) -> anyhow::Result<bool> {
  let mut conn = coord.manager.clone();
  let ok: i64 = Script::new(RELEASE_SCRIPT)
    .key(lock_key(request_id))
    .arg(client_key)
    .invoke_async(&mut conn)
    .await
    .context("lock release failed")?;
  Ok(ok == 1)
}

/// Current holder, or `None` if unlocked or expired. The coordination
/// store is authoritative for this regardless of what `lockedUntil`/
/// `lockedBy` say on the metadata row.
pub async fn current_holder(
  coord: &Coordination,
  request_id: &str,
) -> anyhow::Result<Option<String>> {
  let mut conn = coord.manager.clone();
  let holder: Option<String> = redis::cmd("GET")
    .arg(lock_key(request_id))
    .query_async(&mut conn)
    .await
    .context("lock lookup failed")?;
  Ok(holder)
}
