use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

/// Blob storage boundary. The real backing store (S3 /
/// MinIO) is out of scope; this trait is the seam a production deployment
/// plugs one into, mirroring how `ContainerRuntime` keeps Docker itself
/// external. `LocalBlobStore` below is the working default needed to run
/// the crate at all.
#[async_trait]
pub trait BlobStore: Send + Sync {
  async fn put(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
  ) -> anyhow::Result<()>;

  async fn get(&self, key: &str) -> anyhow::Result<Option<Blob>>;

  async fn delete(&self, key: &str) -> anyhow::Result<()>;

  /// Lexicographically ordered keys under `prefix`, used to enumerate
  /// dataset item pages and to list KV store keys.
  async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
}

pub struct Blob {
  pub body: Vec<u8>,
  pub content_type: String,
}

/// `tokio::fs`-backed reference implementation. Keys are relative paths
/// (`datasets/<id>/<9-digit-index>.json`, `key-value-stores/<id>/<key>`
/// per the persisted-state layout); content type has no native
/// filesystem representation, so it's kept in a `.content-type` sidecar
/// file next to the blob.
pub struct LocalBlobStore {
  root: PathBuf,
}

impl LocalBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> LocalBlobStore {
    LocalBlobStore { root: root.into() }
  }

  fn body_path(&self, key: &str) -> PathBuf {
    self.root.join(key)
  }

  fn content_type_path(&self, key: &str) -> PathBuf {
    let mut path = self.root.join(key).into_os_string();
    path.push(".content-type");
    PathBuf::from(path)
  }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
  async fn put(
    &self,
    key: &str,
    body: Vec<u8>,
    content_type: &str,
  ) -> anyhow::Result<()> {
    let body_path = self.body_path(key);
    if let Some(parent) = body_path.parent() {
      tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("failed to create directory for '{key}'"))?;
    }
    tokio::fs::write(&body_path, &body)
      .await
      .with_context(|| format!("failed to write blob '{key}'"))?;
    tokio::fs::write(self.content_type_path(key), content_type.as_bytes())
      .await
      .with_context(|| {
        format!("failed to write content-type sidecar for '{key}'")
      })?;
    Ok(())
  }

  async fn get(&self, key: &str) -> anyhow::Result<Option<Blob>> {
    let body_path = self.body_path(key);
    let body = match tokio::fs::read(&body_path).await {
      Ok(body) => body,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(None);
      }
      Err(e) => {
        return Err(e).with_context(|| format!("failed to read blob '{key}'"));
      }
    };
    let content_type =
      match tokio::fs::read_to_string(self.content_type_path(key)).await {
        Ok(content_type) => content_type,
        Err(_) => "application/octet-stream".to_string(),
      };
    Ok(Some(Blob { body, content_type }))
  }

  async fn delete(&self, key: &str) -> anyhow::Result<()> {
    match tokio::fs::remove_file(self.body_path(key)).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => {
        return Err(e)
          .with_context(|| format!("failed to delete blob '{key}'"));
      }
    }
    let _ = tokio::fs::remove_file(self.content_type_path(key)).await;
    Ok(())
  }

  async fn list(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
    let dir = self.root.join(prefix);
    let mut keys = Vec::new();
    let mut entries = match tokio::fs::read_dir(&dir).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(keys);
      }
      Err(e) => {
        return Err(e)
          .with_context(|| format!("failed to list prefix '{prefix}'"));
      }
    };
    while let Some(entry) = entries
      .next_entry()
      .await
      .context("failed to read directory entry")?
    {
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if name.ends_with(".content-type") {
        continue;
      }
      keys.push(format!("{prefix}/{name}"));
    }
    keys.sort();
    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_then_get_roundtrips_body_and_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());

    store
      .put("datasets/abc/000000001.json", b"{\"a\":1}".to_vec(), "application/json")
      .await
      .unwrap();

    let blob = store.get("datasets/abc/000000001.json").await.unwrap().unwrap();
    assert_eq!(blob.body, b"{\"a\":1}");
    assert_eq!(blob.content_type, "application/json");
  }

  #[tokio::test]
  async fn get_missing_key_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());
    assert!(store.get("nope").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn list_returns_sorted_keys_under_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());
    store.put("datasets/abc/000000002.json", b"{}".to_vec(), "application/json").await.unwrap();
    store.put("datasets/abc/000000001.json", b"{}".to_vec(), "application/json").await.unwrap();

    let keys = store.list("datasets/abc").await.unwrap();
    assert_eq!(
      keys,
      vec![
        "datasets/abc/000000001.json".to_string(),
        "datasets/abc/000000002.json".to_string(),
      ]
    );
  }

  #[tokio::test]
  async fn delete_removes_body_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());
    store.put("key-value-stores/kv/my-key", b"x".to_vec(), "text/plain").await.unwrap();
    store.delete("key-value-stores/kv/my-key").await.unwrap();
    assert!(store.get("key-value-stores/kv/my-key").await.unwrap().is_none());
  }
}
