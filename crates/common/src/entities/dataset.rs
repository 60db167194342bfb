use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
  pub id: String,
  pub name: Option<String>,
  pub owner_id: String,
  pub item_count: i64,
  pub created_at: i64,
  pub updated_at: i64,
}

/// One page of `ListItems`. `total`/`offset`/`limit` are surfaced as the
/// `x-apify-pagination-*`-style headers on the wire, not in the JSON body.
#[derive(Debug, Clone)]
pub struct ItemsPage {
  pub items: Vec<serde_json::Value>,
  pub total: i64,
  pub offset: i64,
  pub limit: i64,
}
