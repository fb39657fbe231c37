use crate::domain_model::{TokenId, TokenRecord};
use crate::domain_port::{TokenStore, TokenStoreError};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis-backed token store. Records are JSON under a prefixed key;
/// expiry rides on `SET PX`, consumption on `GETDEL`.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token: &TokenId) -> String {
        format!("{}:{}", self.prefix, token)
    }
}

fn decode(raw: Option<String>) -> Result<Option<TokenRecord>, TokenStoreError> {
    match raw {
        Some(raw) => TokenRecord::from_wire(&raw)
            .map(Some)
            .map_err(|e| TokenStoreError::Codec(e.to_string())),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(
        &self,
        key: &TokenId,
        record: &TokenRecord,
        ttl: Duration,
    ) -> Result<(), TokenStoreError> {
        let raw = record
            .to_wire()
            .map_err(|e| TokenStoreError::Codec(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(self.key(key), raw, ttl.as_millis() as u64)
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(key))
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        decode(raw)
    }

    async fn delete(&self, key: &TokenId) -> Result<(), TokenStoreError> {
        let mut conn = self.conn.clone();
        let _: u64 = conn
            .del(self.key(key))
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        Ok(())
    }

    // GETDEL serializes concurrent redemptions of one key on the server
    async fn take(&self, key: &TokenId) -> Result<Option<TokenRecord>, TokenStoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(self.key(key))
            .query_async(&mut conn)
            .await
            .map_err(|e| TokenStoreError::Store(e.to_string()))?;
        decode(raw)
    }
}
