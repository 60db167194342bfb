use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
  pub image: String,
  pub memory_mbytes: i64,
  pub timeout_secs: i64,
}

impl Default for RunOptions {
  fn default() -> Self {
    RunOptions {
      image: String::new(),
      memory_mbytes: 1024,
      timeout_secs: 300,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
  pub id: String,
  /// Unique per owner, not globally.
  pub name: String,
  pub owner_id: String,
  pub title: String,
  pub description: String,
  pub default_run_options: RunOptions,
  pub created_at: i64,
  pub updated_at: i64,
}

/// Body accepted when an actor is pushed/created for the first time.
/// Actor "build" pipelines are out of scope; this is the
/// minimal metadata needed to dispatch runs against the actor afterward.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActorInput {
  pub name: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub default_run_options: RunOptions,
}

/// Body of an owner-initiated actor update. Omitted fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActorInput {
  pub title: Option<String>,
  pub description: Option<String>,
  pub default_run_options: Option<RunOptions>,
}
