//! The process-wide token store.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use super::persist::{PersistError, TokenPersistence};
use super::TokenPair;

/// Holds the current session token pair.
///
/// All access goes through the async `RwLock`, so concurrent in-flight
/// calls observe either the old pair or the new pair, never a torn value.
/// Replace and clear write through to the persistence backend while the
/// write lock is held; persistence failures are logged and do not fail the
/// in-memory update (the live session matters more than the copy on disk).
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<TokenStoreInner>,
}

struct TokenStoreInner {
    tokens: RwLock<Option<TokenPair>>,
    persistence: Arc<dyn TokenPersistence>,
}

impl TokenStore {
    /// Create an empty store backed by `persistence`.
    #[must_use]
    pub fn new(persistence: Arc<dyn TokenPersistence>) -> Self {
        Self {
            inner: Arc::new(TokenStoreInner {
                tokens: RwLock::new(None),
                persistence,
            }),
        }
    }

    /// Load the persisted pair into memory. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the backend is unreadable or corrupt; the
    /// store stays empty in that case.
    pub async fn init(&self) -> Result<(), PersistError> {
        let persisted = self.inner.persistence.load()?;
        *self.inner.tokens.write().await = persisted.map(TokenPair::from_persisted);
        Ok(())
    }

    /// Get the current pair (if signed in).
    pub async fn get(&self) -> Option<TokenPair> {
        self.inner.tokens.read().await.clone()
    }

    /// Replace the pair, persisting the new value.
    pub async fn replace(&self, pair: TokenPair) {
        let mut tokens = self.inner.tokens.write().await;
        if let Err(e) = self.inner.persistence.save(&pair.to_persisted()) {
            warn!(error = %e, "failed to persist session tokens");
        }
        *tokens = Some(pair);
    }

    /// Drop the pair, clearing persistence. Idempotent.
    pub async fn clear(&self) {
        let mut tokens = self.inner.tokens.write().await;
        if let Err(e) = self.inner.persistence.clear() {
            warn!(error = %e, "failed to clear persisted session tokens");
        }
        *tokens = None;
    }
}

#[cfg(test)]
mod tests {
    use secrecy::{ExposeSecret, SecretString};

    use super::super::persist::MemoryTokenPersistence;
    use super::*;

    fn pair(access: &str) -> TokenPair {
        TokenPair {
            access_token: SecretString::from(access),
            refresh_token: Some(SecretString::from("refresh")),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_replace_then_get() {
        let store = TokenStore::new(Arc::new(MemoryTokenPersistence::new()));
        assert!(store.get().await.is_none());

        store.replace(pair("a1")).await;
        let current = store.get().await.expect("pair present");
        assert_eq!(current.access_token.expose_secret(), "a1");
    }

    #[tokio::test]
    async fn test_clear_removes_pair_and_persistence() {
        let persistence = Arc::new(MemoryTokenPersistence::new());
        let store = TokenStore::new(Arc::clone(&persistence) as Arc<dyn TokenPersistence>);

        store.replace(pair("a1")).await;
        store.clear().await;

        assert!(store.get().await.is_none());
        assert!(persistence.load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_init_restores_persisted_pair() {
        let persistence = Arc::new(MemoryTokenPersistence::new());

        let first = TokenStore::new(Arc::clone(&persistence) as Arc<dyn TokenPersistence>);
        first.replace(pair("persisted")).await;

        let second = TokenStore::new(persistence);
        second.init().await.expect("init");
        let current = second.get().await.expect("restored");
        assert_eq!(current.access_token.expose_secret(), "persisted");
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_old_or_new_pair() {
        let store = TokenStore::new(Arc::new(MemoryTokenPersistence::new()));
        store.replace(pair("old")).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move {
                store
                    .get()
                    .await
                    .map(|p| p.access_token.expose_secret().to_owned())
            });
        }
        store.replace(pair("new")).await;

        while let Some(result) = tasks.join_next().await {
            let access = result.expect("task").expect("pair present");
            assert!(access == "old" || access == "new", "torn read: {access}");
        }
    }
}
