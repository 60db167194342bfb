use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestQueue {
  pub id: String,
  pub name: Option<String>,
  pub owner_id: String,
  pub total_request_count: i64,
  pub handled_request_count: i64,
  pub pending_request_count: i64,
  pub had_multiple_clients: bool,
  /// Monotonic counter `orderNo` is assigned from; stored on the queue
  /// document and bumped with an atomic `$inc` on every insert.
  pub next_order_no: i64,
  pub created_at: i64,
  pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  pub id: String,
  pub queue_id: String,
  pub unique_key: String,
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  pub payload: Option<String>,
  #[serde(default)]
  pub headers: serde_json::Map<String, serde_json::Value>,
  #[serde(default)]
  pub user_data: serde_json::Value,
  #[serde(default)]
  pub retry_count: i32,
  #[serde(default)]
  pub no_retry: bool,
  #[serde(default)]
  pub error_messages: Vec<String>,
  pub handled_at: Option<i64>,
  pub order_no: i64,
  pub locked_until: Option<i64>,
  pub locked_by: Option<String>,
}

fn default_method() -> String {
  "GET".to_string()
}

impl Request {
  pub fn is_pending(&self) -> bool {
    self.handled_at.is_none()
  }

  pub fn is_locked_at(&self, now_ms: i64) -> bool {
    self.locked_until.map(|until| until > now_ms).unwrap_or(false)
  }
}

/// Body accepted by `POST /request-queues/:id/requests` and each element of
/// the batch endpoint's array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequestInput {
  pub unique_key: Option<String>,
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  pub payload: Option<String>,
  #[serde(default)]
  pub headers: serde_json::Map<String, serde_json::Value>,
  #[serde(default)]
  pub user_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequestResult {
  pub request_id: String,
  pub was_already_present: bool,
  pub was_already_handled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequestsBatchResult {
  pub processed: Vec<AddRequestResult>,
  pub unprocessed: Vec<UnprocessedRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnprocessedRequest {
  pub url: String,
  pub method: String,
  pub error_message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireHeadResult {
  pub items: Vec<Request>,
  pub queue_has_locked_requests: bool,
  pub had_multiple_clients: bool,
  pub lock_expires_at: i64,
}

/// Patch accepted by `PUT /request-queues/:id/requests/:reqId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestPatch {
  pub handled_at: Option<i64>,
  pub retry_count: Option<i32>,
  pub error_messages: Option<Vec<String>>,
  pub user_data: Option<serde_json::Value>,
  pub no_retry: Option<bool>,
}

/// Derives the canonical `uniqueKey` for a request that didn't supply one.
///
/// This algorithm is fixed exactly because the resulting value
/// is observable to clients (it round-trips back on the `Request` record):
/// for a bodyless `GET`, the lowercased, trimmed URL with its trailing slash
/// and fragment stripped; otherwise `method(hash8(payload)):<normalized_url>`
/// where `hash8` is the first 8 characters of the base64 encoding of the
/// payload's SHA-256 digest.
pub fn derive_unique_key(
  method: &str,
  url: &str,
  payload: Option<&str>,
) -> String {
  let normalized = normalize_url(url);
  if method.eq_ignore_ascii_case("GET") && payload.is_none() {
    return normalized;
  }
  let hash8 = hash8(payload.unwrap_or(""));
  format!("{}({}):{}", method.to_uppercase(), hash8, normalized)
}

fn normalize_url(url: &str) -> String {
  let trimmed = url.trim();
  let without_fragment =
    trimmed.split('#').next().unwrap_or(trimmed);
  let lowered = without_fragment.to_lowercase();
  lowered
    .strip_suffix('/')
    .map(str::to_string)
    .unwrap_or(lowered)
}

fn hash8(payload: &str) -> String {
  let digest = Sha256::digest(payload.as_bytes());
  let encoded =
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, digest);
  encoded.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn get_without_payload_normalizes_url() {
    let key = derive_unique_key("GET", "HTTPS://Example.com/Path/#frag", None);
    assert_eq!(key, "https://example.com/path");
  }

  #[test]
  fn trailing_slash_and_whitespace_stripped() {
    let key = derive_unique_key("get", "  https://a.com/b/  ", None);
    assert_eq!(key, "https://a.com/b");
  }

  #[test]
  fn post_with_payload_includes_method_and_hash() {
    let key = derive_unique_key("POST", "https://a.com", Some("{}"));
    assert!(key.starts_with("POST("));
    assert!(key.ends_with(":https://a.com"));
  }

  #[test]
  fn same_payload_yields_same_key() {
    let a = derive_unique_key("POST", "https://a.com", Some("hello"));
    let b = derive_unique_key("POST", "https://a.com", Some("hello"));
    assert_eq!(a, b);
  }

  #[test]
  fn different_payload_yields_different_key() {
    let a = derive_unique_key("POST", "https://a.com", Some("hello"));
    let b = derive_unique_key("POST", "https://a.com", Some("world"));
    assert_ne!(a, b);
  }
}
