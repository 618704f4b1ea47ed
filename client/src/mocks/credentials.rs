//! Mock credential store for testing.

use crate::credentials::CredentialStore;
use crate::error::{ClientError, Result};
use std::sync::{Arc, Mutex};

/// Write recorded by [`MockCredentialStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `save` with the given token.
    Save(String),
    /// `clear`.
    Clear,
}

#[derive(Debug, Default)]
struct Inner {
    token: Option<String>,
    ops: Vec<StoreOp>,
    fail_loads: bool,
    fail_clears: bool,
}

/// Mock credential store.
///
/// In-memory store that records every write, so tests can assert the
/// order of `save`/`clear` effects.
#[derive(Debug, Clone, Default)]
pub struct MockCredentialStore {
    inner: Arc<Mutex<Inner>>,
}

impl MockCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.lock() {
            inner.token = Some(token.into());
        }
        store
    }

    /// Make every subsequent `load` fail.
    pub fn fail_loads(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_loads = true;
        }
    }

    /// Make every subsequent `clear` fail, leaving the token in place.
    pub fn fail_clears(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_clears = true;
        }
    }

    /// Currently stored token (for testing).
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.token.clone())
    }

    /// Writes issued so far, oldest first (for testing).
    #[must_use]
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner
            .lock()
            .map(|inner| inner.ops.clone())
            .unwrap_or_default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ClientError::Storage("Mutex lock failed".to_string()))?;
        f(&mut inner)
    }
}

impl CredentialStore for MockCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        self.with_inner(|inner| {
            if inner.fail_loads {
                return Err(ClientError::Storage("load failed".to_string()));
            }
            Ok(inner.token.clone())
        })
    }

    async fn save(&self, token: &str) -> Result<()> {
        self.with_inner(|inner| {
            inner.token = Some(token.to_string());
            inner.ops.push(StoreOp::Save(token.to_string()));
            Ok(())
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with_inner(|inner| {
            if inner.fail_clears {
                return Err(ClientError::Storage("clear failed".to_string()));
            }
            inner.token = None;
            inner.ops.push(StoreOp::Clear);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_writes_in_order() {
        let store = MockCredentialStore::with_token("old");
        assert_eq!(store.load().await.unwrap(), Some("old".to_string()));

        store.clear().await.unwrap();
        store.save("new").await.unwrap();

        assert_eq!(store.token(), Some("new".to_string()));
        assert_eq!(
            store.ops(),
            vec![StoreOp::Clear, StoreOp::Save("new".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failing_loads() {
        let store = MockCredentialStore::with_token("abc");
        store.fail_loads();
        assert!(matches!(store.load().await, Err(ClientError::Storage(_))));
    }

    #[tokio::test]
    async fn test_failing_clears_keep_token() {
        let store = MockCredentialStore::with_token("abc");
        store.fail_clears();

        assert!(matches!(store.clear().await, Err(ClientError::Storage(_))));
        assert_eq!(store.token(), Some("abc".to_string()));
        assert!(store.ops().is_empty());
    }
}
