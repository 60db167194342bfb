use std::time::Duration;

use crawlhub_common::entities::{
  now_ms,
  run::{Run, RunStatus},
};
use crawlhub_container_runtime::ContainerSpec;
use crawlhub_coordination::notify::subscribe_run_created;
use crawlhub_database::runs::claim_next_ready_run;
use futures_util::StreamExt;
use tracing::{error, info, instrument, warn};

use crate::config::server_config;
use crate::state::{container_runtime, coordination, db_client, dispatch_slots, log_broadcasters};

/// One Tokio task per worker slot,
/// modeled as the idiomatic counting-semaphore equivalent of the
/// per-key busy-tracking pattern. Each iteration: wait for a slot, wake
/// on `run:new` or the poll tick, attempt the atomic claim, and if
/// successful spawn the run in its own task so this loop can immediately
/// go back to claiming.
pub async fn run_dispatch_loop() {
  let mut run_created = match subscribe_run_created(coordination()).await {
    Ok(stream) => Some(Box::pin(stream)),
    Err(e) => {
      warn!("failed to subscribe to run:new, falling back to polling only | {e:#}");
      None
    }
  };

  let poll = Duration::from_millis(server_config().dispatch_poll_interval_ms);

  loop {
    match &mut run_created {
      Some(stream) => {
        tokio::select! {
          _ = stream.next() => {},
          _ = tokio::time::sleep(poll) => {},
        }
      }
      None => tokio::time::sleep(poll).await,
    }

    loop {
      let Ok(permit) = dispatch_slots().clone().try_acquire_owned() else {
        break;
      };
      // `permit` owns a clone of the `Arc<Semaphore>` handle and is moved
      // into the spawned task; the slot is released when it drops.

      match claim_next_ready_run(&db_client().runs, now_ms()).await {
        Ok(Some(run)) => {
          tokio::spawn(async move {
            let _permit = permit;
            execute_run(run).await;
          });
        }
        Ok(None) => {
          drop(permit);
          break;
        }
        Err(e) => {
          error!("failed to claim next ready run | {e:#}");
          drop(permit);
          break;
        }
      }
    }
  }
}

/// Launches the container, races it against the run's timeout, and
/// reports the outcome. This is the per-run driver: it polls for a
/// concurrent abort alongside the timeout and stops the container the
/// moment one is observed, rather than waiting for natural exit.
#[instrument(skip(run), fields(run_id = %run.id))]
async fn execute_run(run: Run) {
  let env = environment_for(&run);
  let spec = ContainerSpec {
    image: actor_image(&run).await,
    env,
    memory_mbytes: run.memory_mbytes,
    labels: vec![("crawlhub.run-id".to_string(), run.id.clone())],
  };

  let handle = match container_runtime().start(spec).await {
    Ok(handle) => handle,
    Err(e) => {
      error!("failed to start container | {e:#}");
      report_terminal(
        &run,
        RunStatus::Failed,
        format!("failed to start container: {e}"),
        None,
      )
      .await;
      return;
    }
  };

  stream_logs(&run, &handle).await;

  let deadline = tokio::time::Instant::now() + Duration::from_secs(run.timeout_secs.max(0) as u64);
  let mut abort_poll = tokio::time::interval(Duration::from_secs(server_config().abort_poll_interval_secs));
  abort_poll.tick().await; // first tick fires immediately

  let wait_fut = container_runtime().wait(&handle);
  tokio::pin!(wait_fut);

  let mut aborted = false;
  let outcome = loop {
    tokio::select! {
      result = &mut wait_fut => break Some(result),
      _ = tokio::time::sleep_until(deadline) => break None,
      _ = abort_poll.tick() => {
        match crate::orchestrator::get_run(&run.id).await {
          Ok(current) if current.status == RunStatus::Aborted => {
            aborted = true;
            break None;
          }
          _ => continue,
        }
      }
    }
  };

  let (status, message, exit_code) = if aborted {
    info!("run aborted, stopping container");
    if let Err(e) = container_runtime().stop(&handle).await {
      warn!("failed to stop aborted container | {e:#}");
    }
    (RunStatus::Aborted, String::new(), None)
  } else {
    match outcome {
      Some(Ok(code)) => {
        let status = RunStatus::from_exit_code(code);
        let message = if status == RunStatus::Failed {
          format!("container exited with code {code}")
        } else {
          String::new()
        };
        (status, message, Some(code as i32))
      }
      Some(Err(e)) => (
        RunStatus::Failed,
        format!("container runtime error: {e}"),
        None,
      ),
      None => {
        info!("run exceeded timeoutSecs, stopping container");
        if let Err(e) = container_runtime().stop(&handle).await {
          warn!("failed to stop timed-out container | {e:#}");
        }
        (RunStatus::TimedOut, "timed out".to_string(), Some(143))
      }
    }
  };

  if let Err(e) = container_runtime().remove(&handle).await {
    warn!("failed to remove container after run | {e:#}");
  }

  // An abort already transitioned the row to ABORTED directly; recording a
  // terminal status here would just be a no-op expected-transition
  // mismatch, so only report when the driver itself observed the outcome.
  if !aborted {
    report_terminal(&run, status, message, exit_code).await;
  }

  // Dropping the broadcaster closes every `logs::subscribe` stream tailing
  // this run.
  log_broadcasters().remove(&run.id).await;
}

async fn report_terminal(
  run: &Run,
  status: RunStatus,
  message: String,
  exit_code: Option<i32>,
) {
  let message = if message.is_empty() { None } else { Some(message) };
  if let Err(e) =
    crate::orchestrator::update_status(&run.id, RunStatus::Running, status, message, exit_code)
      .await
  {
    warn!("failed to record terminal run status (run may have been aborted concurrently) | {e:#}");
  }
}

async fn stream_logs(run: &Run, handle: &crawlhub_container_runtime::ContainerHandle) {
  let Ok(mut logs) = container_runtime().stream_logs(handle).await else {
    return;
  };
  let run_id = run.id.clone();
  tokio::spawn(async move {
    let broadcaster = log_broadcasters().get_or_insert_default(&run_id).await;
    while let Some(line) = logs.next().await {
      let Ok(line) = line else { continue };
      let entry = crawlhub_common::entities::log::LogEntry {
        timestamp: now_ms(),
        level: crawlhub_common::entities::log::LogLevel::classify(&line),
        message: line,
      };
      if let Err(e) = crawlhub_coordination::logs::append(coordination(), &run_id, &entry).await {
        warn!("failed to append run log line | {e:#}");
      }
      // No receivers yet (no one has subscribed) is the common case and
      // not an error; broadcast is best-effort local fan-out only.
      broadcaster.send(entry);
    }
  });
}

async fn actor_image(run: &Run) -> String {
  match crawlhub_database::helpers::find_one_by_id(&db_client().actors, &run.actor_id).await {
    Ok(actor) => actor.default_run_options.image,
    Err(_) => String::new(),
  }
}

/// Run id, actor id, principal id, the three storage handle ids, the API
/// base URL, a short-lived token representing the run, headless flag,
/// memory cap, absolute timeout timestamp, and a storage-root path.
/// Variable names are part of the external contract.
fn environment_for(run: &Run) -> Vec<(String, String)> {
  let config = server_config();
  let deadline = chrono::Utc::now()
    + chrono::Duration::seconds(run.timeout_secs.max(0));
  vec![
    ("CRAWLHUB_RUN_ID".to_string(), run.id.clone()),
    ("CRAWLHUB_ACTOR_ID".to_string(), run.actor_id.clone()),
    ("CRAWLHUB_PRINCIPAL_ID".to_string(), run.principal_id.clone()),
    ("CRAWLHUB_DEFAULT_DATASET_ID".to_string(), run.default_dataset_id.clone()),
    (
      "CRAWLHUB_DEFAULT_KEY_VALUE_STORE_ID".to_string(),
      run.default_key_value_store_id.clone(),
    ),
    (
      "CRAWLHUB_DEFAULT_REQUEST_QUEUE_ID".to_string(),
      run.default_request_queue_id.clone(),
    ),
    ("CRAWLHUB_API_BASE_URL".to_string(), config.api_base_url.clone()),
    ("CRAWLHUB_TOKEN".to_string(), crawlhub_common::ids::generate_token(32)),
    ("IS_AT_HOME".to_string(), "1".to_string()),
    ("HEADLESS".to_string(), "1".to_string()),
    ("CRAWLHUB_MEMORY_MBYTES".to_string(), run.memory_mbytes.to_string()),
    (
      "CRAWLHUB_TIMEOUT_AT".to_string(),
      deadline.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    ),
    (
      "CRAWLHUB_STORAGE_ROOT".to_string(),
      config.blob_store_root.clone(),
    ),
  ]
}
