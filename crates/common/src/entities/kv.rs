use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueStore {
  pub id: String,
  pub name: Option<String>,
  pub owner_id: String,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct Record {
  pub body: Vec<u8>,
  pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyListingPage {
  pub keys: Vec<String>,
  pub is_truncated: bool,
  pub next_exclusive_start_key: Option<String>,
}
