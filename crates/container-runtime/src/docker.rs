use anyhow::Context;
use async_trait::async_trait;
use bollard::{
  Docker,
  container::{
    Config, LogsOptions, RemoveContainerOptions, StopContainerOptions,
    WaitContainerOptions,
  },
  models::HostConfig,
};
use futures_util::{StreamExt, stream::BoxStream};

use crate::{ContainerHandle, ContainerRuntime, ContainerSpec};

/// Thin wrapper over a `bollard::Docker` handle.
pub struct DockerRuntime {
  docker: Docker,
}

impl DockerRuntime {
  pub fn connect() -> anyhow::Result<DockerRuntime> {
    let docker = Docker::connect_with_local_defaults()
      .context("failed to connect to docker api")?;
    Ok(DockerRuntime { docker })
  }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
  async fn start(
    &self,
    spec: ContainerSpec,
  ) -> anyhow::Result<ContainerHandle> {
    let env = spec
      .env
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>();
    let labels = spec
      .labels
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
      .collect::<std::collections::HashMap<_, _>>();

    let config = Config {
      image: Some(spec.image.as_str()),
      env: Some(env.iter().map(String::as_str).collect()),
      labels: Some(labels),
      host_config: Some(HostConfig {
        memory: Some(spec.memory_mbytes * 1024 * 1024),
        ..Default::default()
      }),
      ..Default::default()
    };

    let created = self
      .docker
      .create_container::<&str, &str>(None, config)
      .await
      .context("failed to create container")?;

    self
      .docker
      .start_container::<String>(&created.id, None)
      .await
      .context("failed to start container")?;

    Ok(ContainerHandle {
      container_id: created.id,
    })
  }

  async fn stream_logs(
    &self,
    handle: &ContainerHandle,
  ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
    let options = LogsOptions::<String> {
      follow: true,
      stdout: true,
      stderr: true,
      ..Default::default()
    };

    let stream = self
      .docker
      .logs(&handle.container_id, Some(options))
      .map(|chunk| {
        chunk
          .map(|log| log.to_string())
          .context("error reading container log stream")
      });

    Ok(Box::pin(stream))
  }

  async fn wait(&self, handle: &ContainerHandle) -> anyhow::Result<i64> {
    let mut stream = self.docker.wait_container(
      &handle.container_id,
      None::<WaitContainerOptions<String>>,
    );
    match stream.next().await {
      Some(Ok(result)) => Ok(result.status_code),
      Some(Err(e)) => Err(e).context("container wait failed"),
      None => Ok(0),
    }
  }

  async fn stop(&self, handle: &ContainerHandle) -> anyhow::Result<()> {
    self
      .docker
      .stop_container(
        &handle.container_id,
        Some(StopContainerOptions { t: 10 }),
      )
      .await
      .context("failed to stop container")?;
    Ok(())
  }

  async fn remove(&self, handle: &ContainerHandle) -> anyhow::Result<()> {
    self
      .docker
      .remove_container(
        &handle.container_id,
        Some(RemoveContainerOptions {
          force: true,
          ..Default::default()
        }),
      )
      .await
      .context("failed to remove container")?;
    Ok(())
  }
}
