pub mod dispatch;
pub mod janitor;

use crawlhub_common::{
  ApiError,
  entities::{
    dataset::Dataset,
    kv::KeyValueStore,
    now_ms,
    queue::RequestQueue,
    run::{CreateRunInput, Run, RunStats, RunStatus},
  },
  ids::generate_id,
};
use crawlhub_database::runs::{resurrect_run as db_resurrect_run, transition_run_status};
use crawlhub_database::helpers::find_one_by_id;
use tracing::instrument;

use crate::state::{blob_store, coordination, db_client};

/// `CreateRun`: allocates the run's three storage handles, writes the
/// `INPUT` blob, inserts the run row `READY`, and wakes any idle dispatch
/// worker.
#[instrument(skip(input), fields(actor_id))]
pub async fn create_run(
  actor_id: &str,
  principal_id: &str,
  input: CreateRunInput,
) -> Result<Run, ApiError> {
  let actor = find_one_by_id(&db_client().actors, actor_id)
    .await
    .map_err(|_| ApiError::not_found(format!("actor '{actor_id}' not found")))?;

  let now = now_ms();

  let dataset = Dataset {
    id: generate_id(),
    name: None,
    owner_id: principal_id.to_string(),
    item_count: 0,
    created_at: now,
    updated_at: now,
  };
  let kv_store = KeyValueStore {
    id: generate_id(),
    name: None,
    owner_id: principal_id.to_string(),
    created_at: now,
    updated_at: now,
  };
  let queue = RequestQueue {
    id: generate_id(),
    name: None,
    owner_id: principal_id.to_string(),
    total_request_count: 0,
    handled_request_count: 0,
    pending_request_count: 0,
    had_multiple_clients: false,
    next_order_no: 0,
    created_at: now,
    updated_at: now,
  };

  db_client()
    .datasets
    .insert_one(&dataset)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  db_client()
    .key_value_stores
    .insert_one(&kv_store)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;
  db_client()
    .request_queues
    .insert_one(&queue)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  blob_store()
    .put(
      &format!("key-value-stores/{}/INPUT", kv_store.id),
      serde_json::to_vec(&input.input).unwrap_or_default(),
      "application/json",
    )
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  let run = Run {
    id: generate_id(),
    actor_id: actor.id.clone(),
    principal_id: principal_id.to_string(),
    status: RunStatus::Ready,
    status_message: None,
    started_at: None,
    finished_at: None,
    default_dataset_id: dataset.id,
    default_key_value_store_id: kv_store.id,
    default_request_queue_id: queue.id,
    timeout_secs: input.timeout.unwrap_or(actor.default_run_options.timeout_secs),
    memory_mbytes: input.memory.unwrap_or(actor.default_run_options.memory_mbytes),
    exit_code: None,
    stats: RunStats::default(),
    created_at: now,
  };

  db_client()
    .runs
    .insert_one(&run)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?;

  if let Err(e) =
    crawlhub_coordination::notify::publish_run_created(coordination(), &run.id).await
  {
    tracing::warn!("failed to publish run:new notification | {e:#}");
  }

  Ok(run)
}

/// `AbortRun`: atomic `RUNNING -> ABORTED`. The running driver discovers
/// the abort on its next status-update attempt against the now-stale
/// expected status and stops the container (see `dispatch.rs`).
pub async fn abort_run(run_id: &str) -> Result<Run, ApiError> {
  let now = now_ms();
  transition_run_status(
    &db_client().runs,
    run_id,
    RunStatus::Running,
    RunStatus::Aborted,
    Some("aborted by request".to_string()),
    None,
    now,
  )
  .await
  .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  .ok_or_else(|| {
    ApiError::InvalidState("run is not RUNNING".to_string())
  })
}

/// `ResurrectRun`: atomic `terminal -> RUNNING`, reusing the run's
/// original storage handles and clearing `finishedAt`.
pub async fn resurrect_run(run_id: &str) -> Result<Run, ApiError> {
  let now = now_ms();
  db_resurrect_run(&db_client().runs, run_id, now)
    .await
    .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
    .ok_or_else(|| {
      ApiError::InvalidState("run is not in a terminal state".to_string())
    })
}

/// `UpdateStatus`: trusted internal call from the container-runtime
/// driver. The state machine is enforced by filtering on the current
/// expected status inside the same atomic update.
pub async fn update_status(
  run_id: &str,
  expected: RunStatus,
  next: RunStatus,
  status_message: Option<String>,
  exit_code: Option<i32>,
) -> Result<Run, ApiError> {
  if !expected.can_transition_to(next) {
    return Err(ApiError::InvalidTransition(format!(
      "{expected:?} -> {next:?} is not a legal transition"
    )));
  }
  let now = now_ms();
  transition_run_status(
    &db_client().runs,
    run_id,
    expected,
    next,
    status_message,
    exit_code,
    now,
  )
  .await
  .map_err(|e| ApiError::dependency_unavailable(e.to_string()))?
  .ok_or_else(|| {
    ApiError::InvalidTransition(
      "run status changed concurrently; transition no longer applies".to_string(),
    )
  })
}

pub async fn get_run(run_id: &str) -> Result<Run, ApiError> {
  find_one_by_id(&db_client().runs, run_id).await
}
