use std::sync::{Arc, OnceLock};

use crawlhub_blobstore::{BlobStore, LocalBlobStore};
use crawlhub_cache::CloneCache;
use crawlhub_container_runtime::{ContainerRuntime, DockerRuntime};
use crawlhub_coordination::Coordination;
use crawlhub_database::Client as DbClient;
use tokio::sync::{Semaphore, broadcast};
use tracing::error;

use crate::config::server_config;

static DB_CLIENT: OnceLock<DbClient> = OnceLock::new();

pub fn db_client() -> &'static DbClient {
  DB_CLIENT.get().unwrap_or_else(|| {
    error!(
      "FATAL: db_client accessed before initialized | Ensure init_db_client() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

pub async fn init_db_client() {
  let config = server_config();
  let client = DbClient::new(&crawlhub_database::DatabaseConfig {
    uri: config.database_uri.clone(),
    database: config.database_name.clone(),
  })
  .await;
  match client {
    Ok(client) => {
      DB_CLIENT.set(client).ok();
    }
    Err(e) => {
      error!("FATAL: failed to initialize database client | {e:#} | Exiting...");
      std::process::exit(1);
    }
  }
}

static COORDINATION: OnceLock<Coordination> = OnceLock::new();

pub fn coordination() -> &'static Coordination {
  COORDINATION.get().unwrap_or_else(|| {
    error!(
      "FATAL: coordination accessed before initialized | Ensure init_coordination() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

pub async fn init_coordination() {
  let config = server_config();
  match Coordination::new(&config.coordination_uri).await {
    Ok(coord) => {
      COORDINATION.set(coord).ok();
    }
    Err(e) => {
      error!("FATAL: failed to initialize coordination store client | {e:#} | Exiting...");
      std::process::exit(1);
    }
  }
}

static BLOB_STORE: OnceLock<Arc<dyn BlobStore>> = OnceLock::new();

pub fn blob_store() -> &'static Arc<dyn BlobStore> {
  BLOB_STORE.get_or_init(|| {
    let config = server_config();
    Arc::new(LocalBlobStore::new(config.blob_store_root.clone()))
  })
}

static CONTAINER_RUNTIME: OnceLock<Arc<dyn ContainerRuntime>> =
  OnceLock::new();

pub fn container_runtime() -> &'static Arc<dyn ContainerRuntime> {
  CONTAINER_RUNTIME.get().unwrap_or_else(|| {
    error!(
      "FATAL: container_runtime accessed before initialized | Ensure init_container_runtime() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

pub fn init_container_runtime() {
  match DockerRuntime::connect() {
    Ok(runtime) => {
      CONTAINER_RUNTIME.set(Arc::new(runtime)).ok();
    }
    Err(e) => {
      error!("FATAL: failed to connect to container runtime | {e:#} | Exiting...");
      std::process::exit(1);
    }
  }
}

/// Bounds in-flight container runs to `MAX_CONCURRENT_RUNS`, the idiomatic
/// counting-resource equivalent of a per-key busy-tracking map.
pub fn dispatch_slots() -> &'static Arc<Semaphore> {
  static SLOTS: OnceLock<Arc<Semaphore>> = OnceLock::new();
  SLOTS.get_or_init(|| {
    Arc::new(Semaphore::new(server_config().max_concurrent_runs))
  })
}

/// Capacity of each per-run broadcast channel; a lagging subscriber drops
/// the oldest buffered entries rather than blocking the log producer.
const LOG_BROADCAST_CAPACITY: usize = 256;

/// Clonable handle around a per-run broadcast sender. `CloneCache::
/// get_or_insert_default` needs a `Default` impl to lazily create the
/// channel on first access; `broadcast::Sender` itself has none (a
/// channel has to be constructed with a capacity), so this newtype
/// supplies it.
#[derive(Clone)]
pub struct LogBroadcaster(
  Arc<broadcast::Sender<crawlhub_common::entities::log::LogEntry>>,
);

impl Default for LogBroadcaster {
  fn default() -> Self {
    let (tx, _rx) = broadcast::channel(LOG_BROADCAST_CAPACITY);
    LogBroadcaster(Arc::new(tx))
  }
}

impl LogBroadcaster {
  pub fn send(&self, entry: crawlhub_common::entities::log::LogEntry) {
    let _ = self.0.send(entry);
  }

  pub fn subscribe(
    &self,
  ) -> broadcast::Receiver<crawlhub_common::entities::log::LogEntry> {
    self.0.subscribe()
  }
}

/// Local fan-out table from run id to a broadcast sender, so a `Subscribe`
/// call on this process instance can tee off an append happening in the
/// same process without an extra Redis round trip. Still backed by the
/// coordination store ring for replay and for subscribers on other server
/// processes (see `crates/coordination::logs`).
pub type LogBroadcastCache = CloneCache<String, LogBroadcaster>;

pub fn log_broadcasters() -> &'static LogBroadcastCache {
  static BROADCASTERS: OnceLock<LogBroadcastCache> = OnceLock::new();
  BROADCASTERS.get_or_init(Default::default)
}
