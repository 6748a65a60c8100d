//! # In-Memory Store
//!
//! `MemoryStore` backs the test suites with the same semantics as the
//! Redis store: replace-on-write hashes, set indexes, counters and lazy
//! key expiry. A single lock around the whole map makes batch
//! application trivially atomic.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::errors::{StoreError, StoreResult};
use super::kv::{KvStore, WriteBatch, WriteOp};

#[derive(Debug, Default)]
struct Inner {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    expiries: HashMap<String, Instant>,
}

impl Inner {
    fn key_exists(&self, key: &str) -> bool {
        self.strings.contains_key(key) || self.hashes.contains_key(key) || self.sets.contains_key(key)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let existed = self.strings.remove(key).is_some()
            | self.hashes.remove(key).is_some()
            | self.sets.remove(key).is_some();
        self.expiries.remove(key);
        existed
    }

    /// Drop the key if its TTL has passed. Expiry is lazy, checked on
    /// access, mirroring how the tests observe Redis.
    fn purge_if_expired(&mut self, key: &str) {
        if let Some(deadline) = self.expiries.get(key) {
            if *deadline <= Instant::now() {
                self.remove_key(key);
            }
        }
    }
}

/// Test double for [`KvStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Command("lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        Ok(inner.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        inner.strings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        Ok(inner.remove_key(key))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<Option<Vec<(String, String)>>> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        Ok(inner.hashes.get(key).map(|fields| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }))
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        let fields = inner.hashes.entry(key.to_string()).or_default();
        let current = match fields.get(field) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                StoreError::Command(format!("hash field {field} is not an integer"))
            })?,
            None => 0,
        };
        let next = current + delta;
        fields.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        Ok(inner
            .sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut inner = self.lock()?;
        let expired: Vec<String> = inner
            .expiries
            .iter()
            .filter(|(_, deadline)| **deadline <= Instant::now())
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            inner.remove_key(&key);
        }

        let mut keys: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.hashes.keys())
            .chain(inner.sets.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        let current = match inner.strings.get(key) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::Command(format!("key {key} is not an integer")))?,
            None => 0,
        };
        let next = current + 1;
        inner.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        if !inner.key_exists(key) {
            return Ok(false);
        }
        inner
            .expiries
            .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>> {
        let mut inner = self.lock()?;
        inner.purge_if_expired(key);
        Ok(inner.expiries.get(key).map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_secs()
                .max(1)
        }))
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut inner = self.lock()?;
        for op in batch.into_ops() {
            match op {
                WriteOp::PutHash { key, fields } => {
                    inner.remove_key(&key);
                    inner.hashes.insert(key, fields.into_iter().collect());
                }
                WriteOp::PutString { key, value } => {
                    inner.strings.insert(key, value);
                }
                WriteOp::Delete { key } => {
                    inner.remove_key(&key);
                }
                WriteOp::AddToSet { key, member } => {
                    inner.sets.entry(key).or_default().insert(member);
                }
                WriteOp::RemoveFromSet { key, member } => {
                    if let Some(members) = inner.sets.get_mut(&key) {
                        members.remove(&member);
                        if members.is_empty() {
                            inner.sets.remove(&key);
                            inner.expiries.remove(&key);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
