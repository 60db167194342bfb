use anyhow::Context;
use redis::aio::ConnectionManager;

/// Handle to the coordination store (Redis). Holds both a long-lived,
/// auto-reconnecting `ConnectionManager` for ordinary commands, and the
/// raw `redis::Client` needed to open a dedicated connection per
/// subscriber — `ConnectionManager` multiplexes commands, but pub/sub
/// requires its own connection for the lifetime of the subscription.
#[derive(Clone)]
pub struct Coordination {
  pub(crate) client: redis::Client,
  pub(crate) manager: ConnectionManager,
}

impl Coordination {
  pub async fn new(url: &str) -> anyhow::Result<Coordination> {
    let client = redis::Client::open(url)
      .context("invalid coordination store url")?;
    let manager = client
      .get_connection_manager()
      .await
      .context("failed to connect to coordination store")?;
    Ok(Coordination { client, manager })
  }

  pub async fn ping(&self) -> anyhow::Result<()> {
    let mut conn = self.manager.clone();
    redis::cmd("PING")
      .query_async::<String>(&mut conn)
      .await
      .context("coordination store ping failed")?;
    Ok(())
  }
}
