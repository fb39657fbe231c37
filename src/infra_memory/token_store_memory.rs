use crate::domain_model::{TokenId, TokenRecord};
use crate::domain_port::{TokenStore, TokenStoreError};
use dashmap::DashMap;
use std::time::{Duration, Instant};

struct Entry {
    raw: String,
    expires_at: Instant,
}

/// In-process token store. Records are held in wire format with lazy
/// expiry on read; `remove` on the map makes `take` atomic.
pub struct MemoryTokenStore {
    entries: DashMap<String, Entry>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        MemoryTokenStore {
            entries: DashMap::new(),
        }
    }

    /// Seed a record in raw wire format. Lets tests and demos plant
    /// legacy-shaped records the current format would never write.
    pub fn put_raw(&self, key: &TokenId, raw: &str, ttl: Duration) {
        self.entries.insert(
            key.0.clone(),
            Entry {
                raw: raw.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &str) -> Result<Option<TokenRecord>, TokenStoreError> {
    TokenRecord::from_wire(raw)
        .map(Some)
        .map_err(|e| TokenStoreError::Codec(e.to_string()))
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn put(
        &self,
        key: &TokenId,
        record: &TokenRecord,
        ttl: Duration,
    ) -> Result<(), TokenStoreError> {
        let raw = record
            .to_wire()
            .map_err(|e| TokenStoreError::Codec(e.to_string()))?;
        self.put_raw(key, &raw, ttl);
        Ok(())
    }

    async fn get(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError> {
        match self.entries.get(&key.0) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => return decode(&entry.raw),
            Some(_) => {}
        }
        // the guard is dropped; evict only if still expired, so a
        // concurrent re-put under the same key keeps its entry
        self.entries
            .remove_if(&key.0, |_, entry| entry.expires_at <= Instant::now());
        Ok(None)
    }

    async fn delete(&self, key: &TokenId) -> Result<(), TokenStoreError> {
        self.entries.remove(&key.0);
        Ok(())
    }

    async fn take(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError> {
        match self.entries.remove(&key.0) {
            Some((_, entry)) if entry.expires_at > Instant::now() => decode(&entry.raw),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::{TokenMetadata, UserId};

    fn record() -> TokenRecord {
        TokenRecord::for_user(&UserId::from("42"), TokenMetadata::default())
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryTokenStore::new();
        let key = TokenId::from("t1");

        store.put(&key, &record(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(record()));
        assert_eq!(store.len(), 1);

        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(store.is_empty());

        // deleting a missing key is fine
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn take_consumes_exactly_once() {
        let store = MemoryTokenStore::new();
        let key = TokenId::from("t1");
        store.put(&key, &record(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.take(&key).await.unwrap(), Some(record()));
        assert_eq!(store.take(&key).await.unwrap(), None);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_behave_as_deleted() {
        let store = MemoryTokenStore::new();
        let key = TokenId::from("t1");
        store.put(&key, &record(), Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(store.is_empty());

        store.put(&key, &record(), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.take(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_read_does_not_disturb_a_replacement() {
        let store = MemoryTokenStore::new();
        let key = TokenId::from("t1");
        store.put_raw(&key, &record().to_wire().unwrap(), Duration::ZERO);

        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(store.is_empty());

        store.put(&key, &record(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(record()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn put_overwrites() {
        let store = MemoryTokenStore::new();
        let key = TokenId::from("t1");
        store.put(&key, &record(), Duration::from_secs(60)).await.unwrap();

        let other = TokenRecord::for_user(&UserId::from("alice"), TokenMetadata::default());
        store.put(&key, &other, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap(), Some(other));
        assert_eq!(store.len(), 1);
    }
}
