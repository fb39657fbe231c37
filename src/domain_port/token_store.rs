use crate::domain_model::{TokenId, TokenRecord};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("store error: {0}")]
    Store(String),
    #[error("codec error: {0}")]
    Codec(String),
}

/// Key-value token storage with per-key TTL. Any store with TTL
/// support satisfies this; the bundled backends are `dashmap` and Redis.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Store `record` under `key`, overwriting. The store owns expiry:
    /// after `ttl` the record must behave as deleted.
    async fn put(
        &self,
        key: &TokenId,
        record: &TokenRecord,
        ttl: Duration,
    ) -> Result<(), TokenStoreError>;

    async fn get(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError>;

    /// Idempotent; a missing key is not an error.
    async fn delete(&self, key: &TokenId) -> Result<(), TokenStoreError>;

    /// Atomic get-and-delete, the redemption primitive. Of two
    /// concurrent takes of one key, at most one may see the record.
    /// The default is the non-atomic pair; both bundled backends
    /// override it with a genuinely atomic form.
    async fn take(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let record = self.get(key).await?;
        self.delete(key).await?;
        Ok(record)
    }
}
