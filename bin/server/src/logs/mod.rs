use crawlhub_common::entities::log::{LOG_REPLAY_COUNT, LogEntry};
use crawlhub_coordination::logs::fetch_recent;
use futures_util::Stream;
use tracing::instrument;

use crate::state::{coordination, log_broadcasters};

/// `Fetch`: a plain paged slice of the ring in append order. `offset`/
/// `limit` behave like the dataset/queue pagination: a page past the end
/// of the ring is simply empty.
#[instrument(fields(run_id, offset, limit))]
pub async fn fetch(
  run_id: &str,
  offset: usize,
  limit: usize,
) -> anyhow::Result<Vec<LogEntry>> {
  // The ring itself is capped at `LOG_CAP`; fetching offset+limit entries
  // and slicing locally is simplest since `LRANGE` already returns them
  // oldest-of-the-requested-window-first (see `fetch_recent`).
  let all = fetch_recent(coordination(), run_id, offset + limit).await?;
  Ok(all.into_iter().skip(offset).take(limit).collect())
}

/// `Subscribe`: replay the most recent `LOG_REPLAY_COUNT` entries, then
/// tail live appends without dropping anything in between.
///
/// Live appends are delivered off the process-local broadcast channel
/// populated by the run's own log-streaming task
/// (`orchestrator::dispatch::stream_logs`) rather than a fresh Redis
/// subscription — this process dispatched the run, so it already has
/// every line passing through it; going back out to the coordination
/// store for a subscription it could serve locally would just spend an
/// extra round trip per line for no added correctness (the coordination
/// store remains the source of truth for `Fetch`/replay and for any
/// other server process that wants to subscribe to the same run).
/// `orchestrator::dispatch` closes the channel when the run reaches a
/// terminal status, which ends this stream.
///
/// The broadcast subscription is opened *before* the replay snapshot is
/// taken, not after: an entry appended in between would otherwise land in
/// neither the replay nor the live feed and be lost outright, which
/// spec's "at least once" contract doesn't allow. Opening the live
/// subscription first only risks the opposite — that same entry showing
/// up in both. Since the snapshot can race the publish, a duplicate isn't
/// necessarily the very last replayed entry, so duplicates are filtered
/// by multiset membership against the whole replay batch rather than by
/// position: the first live entry that doesn't match anything left in the
/// replay closes the overlap window for good.
#[instrument(fields(run_id))]
pub async fn subscribe(
  run_id: &str,
) -> anyhow::Result<impl Stream<Item = LogEntry> + Send> {
  let mut receiver = log_broadcasters()
    .get_or_insert_default(&run_id.to_string())
    .await
    .subscribe();
  let replay = fetch_recent(coordination(), run_id, LOG_REPLAY_COUNT).await?;
  let mut pending_dupes: std::collections::HashMap<LogEntry, usize> =
    std::collections::HashMap::new();
  for entry in &replay {
    *pending_dupes.entry(entry.clone()).or_insert(0) += 1;
  }

  Ok(async_stream::stream! {
    for entry in replay {
      yield entry;
    }
    loop {
      match receiver.recv().await {
        Ok(entry) => {
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
        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
      }
    }
  })
}
