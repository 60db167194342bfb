use std::time::Duration;

use crawlhub_common::entities::now_ms;
use crawlhub_database::runs::find_orphaned_running;
use tracing::{error, warn};

use crate::config::server_config;
use crate::orchestrator::update_status;
use crate::state::db_client;
use crawlhub_common::entities::run::RunStatus;

/// The sole garbage-collection rule: a worker crash
/// between "set RUNNING" and "container start" (or any time thereafter)
/// leaves a row `RUNNING` with no live driver renewing it. This scans for
/// runs whose `startedAt + timeoutSecs + grace` has passed and fails them
/// with `statusMessage = "orphaned"`. A periodic-cleanup pattern,
/// generalized from a startup-only routine into a recurring task.
pub async fn run_janitor_loop() {
  let interval = Duration::from_secs(server_config().janitor_interval_secs);
  loop {
    tokio::time::sleep(interval).await;
    sweep_orphaned_runs().await;
  }
}

async fn sweep_orphaned_runs() {
  let grace_ms = server_config().timeout_grace_secs * 1000;
  let now = now_ms();
  let orphaned = match find_orphaned_running(&db_client().runs, now - grace_ms).await {
    Ok(runs) => runs,
    Err(e) => {
      error!("janitor: failed to scan for orphaned runs | {e:#}");
      return;
    }
  };

  for run in orphaned {
    if let Err(e) = update_status(
      &run.id,
      RunStatus::Running,
      RunStatus::Failed,
      Some("orphaned".to_string()),
      None,
    )
    .await
    {
      warn!("janitor: failed to fail orphaned run {} | {e:#}", run.id);
    }
  }
}
