//! # Redis Store
//!
//! The production [`KvStore`] backend. One multiplexed
//! `ConnectionManager` is created at startup and cloned per call; the
//! manager reconnects on its own, so the rest of the crate never
//! handles connection state.
//!
//! Batches map onto MULTI/EXEC pipelines. A `PutHash` is DEL followed
//! by HSET inside the transaction, giving replace semantics for record
//! rewrites.

use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::errors::{StoreError, StoreResult};
use super::kv::{KvStore, WriteBatch, WriteOp};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Redis-backed [`KvStore`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and verify the server responds before serving traffic.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(StoreError::from)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(StoreError::from)?;
        let store = Self { conn };
        store.ping().await?;
        Ok(store)
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Command(format!("unexpected ping reply: {reply}")))
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Option<Vec<(String, String)>>> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        if fields.is_empty() {
            // HGETALL cannot distinguish an absent key from an empty
            // hash; records always carry fields, so empty means absent.
            Ok(None)
        } else {
            Ok(Some(fields.into_iter().collect()))
        }
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        Ok(conn.smembers(key).await?)
    }

    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn();
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut conn = self.conn();
        Ok(conn.expire(key, ttl_secs as i64).await?)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>> {
        let mut conn = self.conn();
        let remaining: i64 = conn.ttl(key).await?;
        // -2 means no key, -1 means no expiry.
        if remaining < 0 {
            Ok(None)
        } else {
            Ok(Some(remaining as u64))
        }
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.into_ops() {
            match op {
                WriteOp::PutHash { key, fields } => {
                    pipe.del(&key).ignore();
                    pipe.hset_multiple(&key, &fields).ignore();
                }
                WriteOp::PutString { key, value } => {
                    pipe.set(&key, &value).ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.del(&key).ignore();
                }
                WriteOp::AddToSet { key, member } => {
                    pipe.sadd(&key, &member).ignore();
                }
                WriteOp::RemoveFromSet { key, member } => {
                    pipe.srem(&key, &member).ignore();
                }
            }
        }
        let mut conn = self.conn();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
