use anyhow::Context;
use mongodb::{
  Collection,
  bson::doc,
  options::{FindOneAndUpdateOptions, ReturnDocument},
};

use crawlhub_common::entities::run::{Run, RunStatus};

/// Atomically claims the oldest `READY` run and flips it to `RUNNING` in one
/// round trip, returning the claimed document only to the caller that won
/// the race.
///
/// Emulates SQL `SELECT ... FOR UPDATE SKIP LOCKED` with an advisory lock
/// keyed by run id, as long as the at-most-one-worker
/// invariant holds. Mongo's `find_one_and_update` is a single atomic
/// document operation at the storage layer, so filtering on `status: READY`
/// and setting `status: RUNNING` in the same op gives exactly one winner
/// even when every worker polls concurrently.
pub async fn claim_next_ready_run(
  runs: &Collection<Run>,
  now_ms: i64,
) -> anyhow::Result<Option<Run>> {
  let options = FindOneAndUpdateOptions::builder()
    .sort(doc! { "createdAt": 1 })
    .return_document(ReturnDocument::After)
    .build();

  runs
    .find_one_and_update(
      doc! { "status": bson_status(RunStatus::Ready) },
      doc! { "$set": {
        "status": bson_status(RunStatus::Running),
        "startedAt": now_ms,
      } },
    )
    .with_options(options)
    .await
    .context("claim_next_ready_run failed")
}

/// Transitions a run's status, enforcing the state machine at the database
/// boundary too (not just in the orchestrator) by filtering on the expected
/// current status in the same atomic update. Returns `Ok(None)` if another
/// writer already moved the run past the expected state, letting the caller
/// treat a lost race as a no-op instead of corrupting state.
pub async fn transition_run_status(
  runs: &Collection<Run>,
  run_id: &str,
  expected: RunStatus,
  next: RunStatus,
  status_message: Option<String>,
  exit_code: Option<i32>,
  now_ms: i64,
) -> anyhow::Result<Option<Run>> {
  let mut set = doc! {
    "status": bson_status(next),
    "statusMessage": status_message,
    "exitCode": exit_code,
  };
  if next.is_terminal() {
    set.insert("finishedAt", now_ms);
  }

  let options = FindOneAndUpdateOptions::builder()
    .return_document(ReturnDocument::After)
    .build();

  runs
    .find_one_and_update(
      doc! { "id": run_id, "status": bson_status(expected) },
      doc! { "$set": set },
    )
    .with_options(options)
    .await
    .context("transition_run_status failed")
}

/// Any terminal run is eligible for resurrection. Resurrection concatenates
/// prior log history rather than truncating it, which the
/// `crates/coordination` log ring implements by simply not clearing the
/// run's existing ring key.
pub async fn resurrect_run(
  runs: &Collection<Run>,
  run_id: &str,
  now_ms: i64,
) -> anyhow::Result<Option<Run>> {
  let options = FindOneAndUpdateOptions::builder()
    .return_document(ReturnDocument::After)
    .build();

  runs
    .find_one_and_update(
      doc! { "id": run_id, "status": { "$in": terminal_statuses() } },
      doc! { "$set": {
        "status": bson_status(RunStatus::Running),
        "startedAt": now_ms,
        "finishedAt": mongodb::bson::Bson::Null,
        "exitCode": mongodb::bson::Bson::Null,
      } },
    )
    .with_options(options)
    .await
    .context("resurrect_run failed")
}

/// Runs stuck `RUNNING` past their own per-run deadline
/// (`startedAt + timeoutSecs * 1000 < now`) with no worker renewing them —
/// the janitor's orphan scan. A crashed worker never gets to report a
/// status, so this is the only way those runs ever reach a terminal state.
pub async fn find_orphaned_running(
  runs: &Collection<Run>,
  now_ms: i64,
) -> anyhow::Result<Vec<Run>> {
  use futures_util::TryStreamExt;
  runs
    .find(doc! {
      "status": bson_status(RunStatus::Running),
      "$expr": {
        "$lt": [
          { "$add": ["$startedAt", { "$multiply": ["$timeoutSecs", 1000] }] },
          now_ms,
        ]
      },
    })
    .await
    .context("find_orphaned_running query failed")?
    .try_collect()
    .await
    .context("find_orphaned_running collect failed")
}

fn bson_status(status: RunStatus) -> String {
  mongodb::bson::to_bson(&status)
    .expect("RunStatus always serializes")
    .as_str()
    .expect("RunStatus serializes to a string")
    .to_string()
}

fn terminal_statuses() -> Vec<String> {
  [
    RunStatus::Succeeded,
    RunStatus::Failed,
    RunStatus::TimedOut,
    RunStatus::Aborted,
  ]
  .into_iter()
  .map(bson_status)
  .collect()
}
