use std::sync::OnceLock;

use axum::http::HeaderValue;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

/// Typed environment configuration, loaded once via `envy::from_env` into
/// a typed struct that fails loudly at startup on any missing/malformed
/// variable rather than limping along half-configured. There is no
/// file-based config layer — no config-file format is named, so
/// environment variables are the whole story.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_port")]
  pub port: u16,

  pub database_uri: String,
  #[serde(default = "default_database_name")]
  pub database_name: String,

  pub coordination_uri: String,

  #[serde(default = "default_blob_root")]
  pub blob_store_root: String,

  #[serde(default = "default_api_base_url")]
  pub api_base_url: String,

  #[serde(default = "default_max_concurrent_runs")]
  pub max_concurrent_runs: usize,
  #[serde(default = "default_janitor_interval_secs")]
  pub janitor_interval_secs: u64,
  #[serde(default = "default_dispatch_poll_interval_ms")]
  pub dispatch_poll_interval_ms: u64,
  #[serde(default = "default_timeout_grace_secs")]
  pub timeout_grace_secs: i64,
  #[serde(default = "default_abort_poll_interval_secs")]
  pub abort_poll_interval_secs: u64,

  #[serde(default)]
  pub cors_allowed_origins: Vec<String>,
  #[serde(default)]
  pub cors_allow_credentials: bool,

  #[serde(default)]
  pub log_level: Option<String>,
  #[serde(default)]
  pub log_json: bool,
}

fn default_port() -> u16 {
  8080
}

fn default_database_name() -> String {
  "crawlhub".to_string()
}

fn default_blob_root() -> String {
  "./blob-store".to_string()
}

fn default_api_base_url() -> String {
  "http://localhost:8080".to_string()
}

fn default_max_concurrent_runs() -> usize {
  4
}

fn default_janitor_interval_secs() -> u64 {
  30
}

fn default_dispatch_poll_interval_ms() -> u64 {
  1000
}

fn default_timeout_grace_secs() -> i64 {
  10
}

fn default_abort_poll_interval_secs() -> u64 {
  2
}

/// Panics on a missing/malformed required variable: fail loudly at
/// startup rather than limp along with a half-valid configuration.
pub fn server_config() -> &'static ServerConfig {
  static SERVER_CONFIG: OnceLock<ServerConfig> = OnceLock::new();
  SERVER_CONFIG.get_or_init(|| {
    envy::from_env::<ServerConfig>()
      .expect("failed to parse server environment configuration")
  })
}

/// Allows all origins unless an explicit allow-list is configured.
pub fn cors_layer() -> CorsLayer {
  let config = server_config();
  let allowed_origins = if config.cors_allowed_origins.is_empty() {
    vec![HeaderValue::from_static("*")]
  } else {
    config
      .cors_allowed_origins
      .iter()
      .filter_map(|origin| HeaderValue::from_str(origin).ok())
      .collect()
  };
  CorsLayer::new()
    .allow_origin(allowed_origins)
    .allow_methods(tower_http::cors::Any)
    .allow_headers(tower_http::cors::Any)
    .allow_credentials(config.cors_allow_credentials)
}
