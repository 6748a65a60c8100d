//! # Key-Value Store Trait
//!
//! The persistence seam for the whole crate. Every typed store and
//! service receives a `KvStore` by injection; nothing reaches for a
//! global client. Two implementations exist: `RedisStore` for the real
//! backend and `MemoryStore` for tests.
//!
//! Writes that must land together (a record hash plus its index
//! entries) are collected into a [`WriteBatch`] and applied atomically
//! by the backend, so an index entry never points at a record that was
//! not written.

use async_trait::async_trait;

use super::errors::StoreResult;

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Replace the hash at `key` with exactly `fields`.
    ///
    /// Replace semantics (delete first, then write) so cleared optional
    /// fields do not linger from an earlier version of the record.
    PutHash {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// Set a plain string value (unique index entries).
    PutString { key: String, value: String },

    /// Remove a key of any type.
    Delete { key: String },

    /// Add a member to a set (status indexes).
    AddToSet { key: String, member: String },

    /// Remove a member from a set.
    RemoveFromSet { key: String, member: String },
}

/// An ordered list of mutations applied atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the hash at `key` with `fields`.
    pub fn put_hash(mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        self.ops.push(WriteOp::PutHash {
            key: key.into(),
            fields,
        });
        self
    }

    /// Set a string value at `key`.
    pub fn put_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(WriteOp::PutString {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Delete `key`.
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    /// Add `member` to the set at `key`.
    pub fn add_to_set(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(WriteOp::AddToSet {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Remove `member` from the set at `key`.
    pub fn remove_from_set(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(WriteOp::RemoveFromSet {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    /// Append a pre-built op (index helpers produce these).
    pub fn push(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The ops in application order, for backends.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Async key-value backend the record stores are built on.
///
/// The surface is deliberately small: string keys for unique indexes,
/// hashes for records, sets for status indexes, and counters with TTL
/// for rate-limit windows.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Round-trip to the backend; used by health checks.
    async fn ping(&self) -> StoreResult<()>;

    /// Read a string key.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string key.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key of any type. Returns whether the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Read all fields of a hash. `None` when the key is absent.
    async fn hash_get_all(&self, key: &str) -> StoreResult<Option<Vec<(String, String)>>>;

    /// Atomically add `delta` to an integer hash field, creating it at
    /// zero when missing. Returns the new value.
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// All members of the set at `key` (empty when absent).
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Every key starting with `prefix`, in no particular order.
    async fn scan_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Atomically increment the counter at `key`, creating it at zero.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set a TTL on `key`. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// Remaining TTL in seconds, `None` when the key is absent or has
    /// no expiry.
    async fn ttl(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Apply all ops in `batch` atomically.
    async fn apply(&self, batch: WriteBatch) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_collects_ops_in_order() {
        let batch = WriteBatch::new()
            .put_hash("message:1", vec![("name".to_string(), "\"a\"".to_string())])
            .add_to_set("message:index:status:unread", "1")
            .delete("message:index:email:old");

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], WriteOp::PutHash { .. }));
        assert!(matches!(batch.ops()[2], WriteOp::Delete { .. }));
    }

    #[test]
    fn test_empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
