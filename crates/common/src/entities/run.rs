use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum RunStatus {
  Ready,
  Running,
  Succeeded,
  Failed,
  TimedOut,
  Aborted,
}

impl RunStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      RunStatus::Succeeded
        | RunStatus::Failed
        | RunStatus::TimedOut
        | RunStatus::Aborted
    )
  }

  /// Every legal edge in the run status state machine. Resurrection
  /// (`terminal -> Running`) is handled separately by `ResurrectRun`, not
  /// through this table, since it is allowed from *any* terminal state
  /// rather than from one specific predecessor.
  pub fn can_transition_to(self, next: RunStatus) -> bool {
    matches!(
      (self, next),
      (RunStatus::Ready, RunStatus::Running)
        | (RunStatus::Running, RunStatus::Succeeded)
        | (RunStatus::Running, RunStatus::Failed)
        | (RunStatus::Running, RunStatus::TimedOut)
        | (RunStatus::Running, RunStatus::Aborted)
    )
  }

  pub fn from_exit_code(code: i64) -> RunStatus {
    match code {
      0 => RunStatus::Succeeded,
      143 => RunStatus::TimedOut,
      _ => RunStatus::Failed,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
  #[serde(default)]
  pub items_pushed: i64,
  #[serde(default)]
  pub requests_finished: i64,
  #[serde(default)]
  pub requests_failed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
  pub id: String,
  pub actor_id: String,
  pub principal_id: String,
  pub status: RunStatus,
  pub status_message: Option<String>,
  pub started_at: Option<i64>,
  pub finished_at: Option<i64>,
  pub default_dataset_id: String,
  pub default_key_value_store_id: String,
  pub default_request_queue_id: String,
  pub timeout_secs: i64,
  pub memory_mbytes: i64,
  pub exit_code: Option<i32>,
  pub stats: RunStats,
  pub created_at: i64,
}

impl Run {
  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}

/// Body of `POST /acts/:id/runs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunInput {
  #[serde(default)]
  pub input: serde_json::Value,
  pub timeout: Option<i64>,
  pub memory: Option<i64>,
}

/// Body of `PUT /actor-runs/:id` — trusted internal status update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRunStatusInput {
  pub status: RunStatus,
  pub status_message: Option<String>,
  pub exit_code: Option<i32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ready_only_advances_to_running() {
    assert!(RunStatus::Ready.can_transition_to(RunStatus::Running));
    assert!(!RunStatus::Ready.can_transition_to(RunStatus::Succeeded));
    assert!(!RunStatus::Ready.can_transition_to(RunStatus::Aborted));
  }

  #[test]
  fn running_advances_to_any_terminal_status() {
    for next in [
      RunStatus::Succeeded,
      RunStatus::Failed,
      RunStatus::TimedOut,
      RunStatus::Aborted,
    ] {
      assert!(RunStatus::Running.can_transition_to(next));
    }
  }

  #[test]
  fn terminal_statuses_have_no_outgoing_transitions_in_the_table() {
    for terminal in [
      RunStatus::Succeeded,
      RunStatus::Failed,
      RunStatus::TimedOut,
      RunStatus::Aborted,
    ] {
      for next in [
        RunStatus::Ready,
        RunStatus::Running,
        RunStatus::Succeeded,
        RunStatus::Failed,
        RunStatus::TimedOut,
        RunStatus::Aborted,
      ] {
        assert!(!terminal.can_transition_to(next));
      }
    }
  }

  #[test]
  fn exit_code_classification() {
    assert_eq!(RunStatus::from_exit_code(0), RunStatus::Succeeded);
    assert_eq!(RunStatus::from_exit_code(143), RunStatus::TimedOut);
    assert_eq!(RunStatus::from_exit_code(1), RunStatus::Failed);
    assert_eq!(RunStatus::from_exit_code(137), RunStatus::Failed);
  }

  #[test]
  fn is_terminal_matches_the_transition_table() {
    assert!(!RunStatus::Ready.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Succeeded.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
    assert!(RunStatus::TimedOut.is_terminal());
    assert!(RunStatus::Aborted.is_terminal());
  }
}
