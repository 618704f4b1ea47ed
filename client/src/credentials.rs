//! Credential store.
//!
//! Persists the access token under a single key of a durable key-value
//! store. The session client is the only writer.

use crate::error::{ClientError, Result};
use serde_json::{Map, Value};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable storage for the access token.
///
/// # Implementation Notes
///
/// - Operations must take effect in the order they are issued. The session
///   client awaits every write before issuing the next one, so a store only
///   has to avoid reordering its own writes.
/// - `load` is called once per outbound request; cache when the backing
///   medium is slow.
pub trait CredentialStore: Send + Sync {
    /// Read the stored token.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be read.
    fn load(&self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replace the stored token.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written.
    fn save(&self, token: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove the stored token.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct Cache {
    loaded: bool,
    token: Option<String>,
}

/// Credential store backed by a JSON object file.
///
/// The file maps storage keys to strings, so several clients (or other
/// tools) can share it; only the configured key is ever touched. The token
/// is cached after the first read. Writes go through a temporary file and a
/// rename.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    key: String,
    cache: Mutex<Cache>,
}

impl FileCredentialStore {
    /// Create a store for `key` inside the file at `path`.
    ///
    /// The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Map<String, Value>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(ClientError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) => Err(ClientError::Storage(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(ClientError::Storage(format!(
                "failed to parse {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ClientError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let serialized = serde_json::to_vec_pretty(entries)
            .map_err(|e| ClientError::Storage(format!("failed to serialize entries: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serialized).await.map_err(|e| {
            ClientError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ClientError::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })
    }

    async fn update(&self, token: Option<&str>) -> Result<()> {
        let mut cache = self.cache.lock().await;

        let mut entries = self.read_entries().await?;
        match token {
            Some(token) => {
                entries.insert(self.key.clone(), Value::String(token.to_string()));
            }
            None => {
                entries.remove(&self.key);
            }
        }
        self.write_entries(&entries).await?;

        cache.loaded = true;
        cache.token = token.map(str::to_string);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        let mut cache = self.cache.lock().await;
        if !cache.loaded {
            let entries = self.read_entries().await?;
            cache.token = entries
                .get(&self.key)
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            cache.loaded = true;
        }
        Ok(cache.token.clone())
    }

    async fn save(&self, token: &str) -> Result<()> {
        // An empty token is a removal.
        if token.is_empty() {
            return self.update(None).await;
        }
        self.update(Some(token)).await
    }

    async fn clear(&self) -> Result<()> {
        self.update(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("storage.json"), "access_token");
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_survives_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileCredentialStore::new(&path, "access_token");
        store.save("abc").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("abc".to_string()));

        let reopened = FileCredentialStore::new(&path, "access_token");
        assert_eq!(reopened.load().await.unwrap(), Some("abc".to_string()));

        reopened.clear().await.unwrap();
        let reopened_again = FileCredentialStore::new(&path, "access_token");
        assert_eq!(reopened_again.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_keys_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, r#"{"theme":"dark"}"#).await.unwrap();

        let store = FileCredentialStore::new(&path, "access_token");
        store.save("abc").await.unwrap();
        store.clear().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let value: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value, serde_json::json!({"theme": "dark"}));
    }

    #[tokio::test]
    async fn test_empty_token_is_a_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("storage.json"), "access_token");
        store.save("abc").await.unwrap();
        store.save("").await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = FileCredentialStore::new(&path, "access_token");
        assert!(matches!(store.load().await, Err(ClientError::Storage(_))));
    }
}
