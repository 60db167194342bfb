use anyhow::Context;
use futures_util::{Stream, StreamExt};

use crate::client::Coordination;

const RUN_NEW_CHANNEL: &str = "run:new";

/// Wakes any idle dispatch worker polling for newly-`READY` runs. Purely
/// an optimization over the janitor-style poll loop — a worker that
/// misses the notification still finds the run on its next poll tick, so
/// this is never load-bearing for correctness.
pub async fn publish_run_created(
  coord: &Coordination,
  run_id: &str,
) -> anyhow::Result<()> {
  let mut conn = coord.manager.clone();
  redis::cmd("PUBLISH")
    .arg(RUN_NEW_CHANNEL)
    .arg(run_id)
    .query_async::<i64>(&mut conn)
    .await
    .context("run:new publish failed")?;
  Ok(())
}

pub async fn subscribe_run_created(
  coord: &Coordination,
) -> anyhow::Result<impl Stream<Item = String> + Send> {
  let mut pubsub = coord
    .client
    .get_async_pubsub()
    .await
    .context("failed to open pubsub connection")?;
  pubsub
    .subscribe(RUN_NEW_CHANNEL)
    .await
    .context("failed to subscribe to run:new")?;

  Ok(async_stream::stream! {
    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
      if let Ok(run_id) = msg.get_payload::<String>() {
        yield run_id;
      }
    }
  })
}
