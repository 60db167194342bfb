use anyhow::Context;
use mongodb::{Client as MongoClient, Collection, IndexModel, bson::doc};

use crawlhub_common::entities::{
  actor::Actor, dataset::Dataset, kv::KeyValueStore, queue::{Request, RequestQueue},
  run::Run,
};

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
  pub uri: String,
  pub database: String,
}

/// Named-collection handle: callers reach
/// collections directly as fields rather than through a generic accessor.
#[derive(Debug, Clone)]
pub struct Client {
  pub actors: Collection<Actor>,
  pub runs: Collection<Run>,
  pub datasets: Collection<Dataset>,
  pub key_value_stores: Collection<KeyValueStore>,
  pub request_queues: Collection<RequestQueue>,
  pub requests: Collection<Request>,
}

impl Client {
  /// Liveness check for `GET /health`: round-trips a trivial command
  /// against whichever collection happens to be cheapest to touch.
  pub async fn ping(&self) -> anyhow::Result<()> {
    self
      .actors
      .estimated_document_count()
      .await
      .context("database ping failed")?;
    Ok(())
  }

  pub async fn new(config: &DatabaseConfig) -> anyhow::Result<Client> {
    let client = MongoClient::with_uri_str(&config.uri)
      .await
      .context("failed to connect to mongodb")?;
    let db = client.database(&config.database);

    let client = Client {
      actors: db.collection("actors"),
      runs: db.collection("runs"),
      datasets: db.collection("datasets"),
      key_value_stores: db.collection("key_value_stores"),
      request_queues: db.collection("request_queues"),
      requests: db.collection("requests"),
    };

    client
      .ensure_indexes()
      .await
      .context("failed to ensure mongodb indexes")?;

    Ok(client)
  }

  /// Opaque ids are stored as a plain unique `id` field rather than as
  /// Mongo's `_id` (see `crawlhub_common::ids`), so every collection needs
  /// its own uniqueness constraint instead of inheriting one for free.
  async fn ensure_indexes(&self) -> anyhow::Result<()> {
    self
      .actors
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .actors
      .create_index(
        IndexModel::builder()
          .keys(doc! { "ownerId": 1, "name": 1 })
          .options(
            mongodb::options::IndexOptions::builder()
              .unique(true)
              .build(),
          )
          .build(),
      )
      .await?;
    self
      .runs
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .runs
      .create_index(
        IndexModel::builder()
          .keys(doc! { "status": 1, "createdAt": 1 })
          .build(),
      )
      .await?;
    self
      .datasets
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .key_value_stores
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .request_queues
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .requests
      .create_index(
        IndexModel::builder().keys(doc! { "id": 1 }).build(),
      )
      .await?;
    self
      .requests
      .create_index(
        IndexModel::builder()
          .keys(doc! { "queueId": 1, "uniqueKey": 1 })
          .options(
            mongodb::options::IndexOptions::builder()
              .unique(true)
              .build(),
          )
          .build(),
      )
      .await?;
    self
      .requests
      .create_index(
        IndexModel::builder()
          .keys(doc! { "queueId": 1, "orderNo": 1 })
          .build(),
      )
      .await?;
    Ok(())
  }
}
