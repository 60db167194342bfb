use async_trait::async_trait;
use futures_util::stream::BoxStream;

mod docker;

pub use docker::DockerRuntime;

/// Fixed environment block the orchestrator materializes before start:
/// run id, actor id, principal id, the three storage handle ids, the API
/// base URL, a short-lived token representing the run, headless flag,
/// memory cap, absolute timeout timestamp, and a storage-root path.
pub struct ContainerSpec {
  pub image: String,
  pub env: Vec<(String, String)>,
  pub memory_mbytes: i64,
  pub labels: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ContainerHandle {
  pub container_id: String,
}

/// Container execution boundary. The runtime itself is kept external (a
/// local Docker daemon is one implementation); this trait is that seam.
/// There is no remote-agent protocol here — a direct local Docker socket
/// is assumed to be reachable from the process that dispatches runs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
  async fn start(&self, spec: ContainerSpec) -> anyhow::Result<ContainerHandle>;

  /// Streams combined stdout/stderr lines as they're produced.
  async fn stream_logs(
    &self,
    handle: &ContainerHandle,
  ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>>;

  /// Blocks until the container exits, returning its exit code.
  async fn wait(&self, handle: &ContainerHandle) -> anyhow::Result<i64>;

  /// Sends the container a termination signal (used on `AbortRun` and by
  /// the orchestrator's own timeout enforcement).
  async fn stop(&self, handle: &ContainerHandle) -> anyhow::Result<()>;

  async fn remove(&self, handle: &ContainerHandle) -> anyhow::Result<()>;
}
