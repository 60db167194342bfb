use anyhow::Context;
use futures_util::Stream;

use crawlhub_common::entities::log::{LOG_CAP, LOG_TTL_SECS, LogEntry};

use crate::client::Coordination;

fn ring_key(run_id: &str) -> String {
  format!("logs:{run_id}:ring")
}

fn channel_key(run_id: &str) -> String {
  format!("logs:{run_id}:channel")
}

/// Appends one line to the run's capped ring and fans it out to live
/// subscribers in the same round trip. `LPUSH` + `LTRIM` keeps the ring
/// bounded to `LOG_CAP`; `EXPIRE` bounds the lifetime of logs for runs
/// nobody ever fetches; `PUBLISH` is best-effort delivery to anything
/// currently subscribed — a subscriber that wasn't listening yet gets the
/// line on its next `Fetch` replay instead.
pub async fn append(
  coord: &Coordination,
  run_id: &str,
  entry: &LogEntry,
) -> anyhow::Result<()> {
  let mut conn = coord.manager.clone();
  let payload =
    serde_json::to_string(entry).context("failed to serialize log entry")?;

  redis::pipe()
    .atomic()
    .cmd("LPUSH")
    .arg(ring_key(run_id))
    .arg(&payload)
    .ignore()
    .cmd("LTRIM")
    .arg(ring_key(run_id))
    .arg(0)
    .arg(LOG_CAP as i64 - 1)
    .ignore()
    .cmd("EXPIRE")
    .arg(ring_key(run_id))
    .arg(LOG_TTL_SECS)
    .ignore()
    .query_async::<()>(&mut conn)
    .await
    .context("log append pipeline failed")?;

  redis::cmd("PUBLISH")
    .arg(channel_key(run_id))
    .arg(&payload)
    .query_async::<i64>(&mut conn)
    .await
    .context("log publish failed")?;

  Ok(())
}

/// Most recent entries in chronological order (oldest of the recent batch
/// first), used to seed a `Subscribe` call before it switches to live
/// tailing, and by plain `Fetch`.
pub async fn fetch_recent(
  coord: &Coordination,
  run_id: &str,
  count: usize,
) -> anyhow::Result<Vec<LogEntry>> {
  let mut conn = coord.manager.clone();
  let raw: Vec<String> = redis::cmd("LRANGE")
    .arg(ring_key(run_id))
    .arg(0)
    .arg(count as i64 - 1)
    .query_async(&mut conn)
    .await
    .context("log fetch failed")?;

  let mut entries: Vec<LogEntry> = raw
    .into_iter()
    .filter_map(|line| serde_json::from_str(&line).ok())
    .collect();
  entries.reverse();
  Ok(entries)
}

/// Opens the live subscription *before* snapshotting history, then
/// replays, then tails: subscribing first and replaying second means the
/// only possible error is a duplicate in the overlap window (an entry
/// appended between subscribe and replay shows up in both), never a gap.
/// Replay-then-subscribe would risk the opposite — an append landing in
/// the gap between the snapshot and the subscription is lost outright,
/// which spec's "at least once" contract doesn't allow. Duplicates land
/// somewhere in the tail of the replayed batch (not necessarily the very
/// last entry, since the snapshot can race the publish), so they're
/// filtered by multiset membership rather than position: anything from
/// the replay that shows up again live is dropped once, and the first
/// live entry that doesn't match closes the overlap window for good.
pub async fn subscribe(
  coord: &Coordination,
  run_id: &str,
  replay_count: usize,
) -> anyhow::Result<impl Stream<Item = LogEntry> + Send> {
  let mut pubsub = coord
    .client
    .get_async_pubsub()
    .await
    .context("failed to open pubsub connection")?;
  pubsub
    .subscribe(channel_key(run_id))
    .await
    .context("failed to subscribe to log channel")?;

  let replay = fetch_recent(coord, run_id, replay_count).await?;
  let mut pending_dupes: std::collections::HashMap<LogEntry, usize> =
    std::collections::HashMap::new();
  for entry in &replay {
    *pending_dupes.entry(entry.clone()).or_insert(0) += 1;
  }

  Ok(async_stream::stream! {
    for entry in replay {
      yield entry;
    }
    let mut messages = pubsub.on_message();
    while let Some(msg) = futures_util::StreamExt::next(&mut messages).await {
      let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(_) => continue,
      };
      let Ok(entry) = serde_json::from_str::<LogEntry>(&payload) else { continue };
      if !pending_dupes.is_empty() {
        if let Some(count) = pending_dupes.get_mut(&entry) {
          *count -= 1;
          if *count == 0 {
            pending_dupes.remove(&entry);
          }
          continue;
        }
        pending_dupes.clear();
      }
      yield entry;
    }
  })
}
