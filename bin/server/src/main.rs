#[macro_use]
extern crate tracing;

mod actor;
mod api;
mod auth;
mod config;
mod dataset;
mod kv;
mod logs;
mod orchestrator;
mod queue;
mod state;
mod storage_alias;

use crawlhub_logger::{LogConfig, LogLevel, StdioLogMode};

use crate::config::server_config;

fn logging_config() -> LogConfig {
  let config = server_config();
  let level = match config.log_level.as_deref() {
    Some("trace") => LogLevel::Trace,
    Some("debug") => LogLevel::Debug,
    Some("warn") => LogLevel::Warn,
    Some("error") => LogLevel::Error,
    _ => LogLevel::Info,
  };
  LogConfig {
    level,
    stdio: if config.log_json { StdioLogMode::Json } else { StdioLogMode::Standard },
    ..Default::default()
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let config = server_config();
  crawlhub_logger::init(&logging_config())?;

  info!("crawlhub server version: v{}", env!("CARGO_PKG_VERSION"));

  state::init_db_client().await;
  state::init_coordination().await;
  state::init_container_runtime();

  tokio::spawn(orchestrator::dispatch::run_dispatch_loop());
  tokio::spawn(orchestrator::janitor::run_janitor_loop());

  let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
  info!("listening on :{}", config.port);

  axum::serve(listener, api::app())
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c()
      .await
      .expect("failed to install ctrl-c handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("shutdown signal received");
}
