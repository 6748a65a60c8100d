//! Secondary indexes over record stores.
//!
//! Two shapes cover every lookup the application needs: a unique index
//! maps one field value to one record id (email -> subscriber), and a
//! set index groups record ids by a field value (status -> messages).
//! Index keys live at `"{prefix}:index:{field}:{value}"` beside the
//! records they point at.
//!
//! Index writes are only ever issued inside the same `WriteBatch` as
//! the record mutation they mirror, so a crash cannot separate them.

use super::errors::StoreResult;
use super::kv::{KvStore, WriteOp};

/// One-to-one mapping from a field value to a record id.
#[derive(Debug, Clone, Copy)]
pub struct UniqueIndex {
    prefix: &'static str,
    field: &'static str,
}

impl UniqueIndex {
    pub const fn new(prefix: &'static str, field: &'static str) -> Self {
        Self { prefix, field }
    }

    pub fn key(&self, value: &str) -> String {
        format!("{}:index:{}:{}", self.prefix, self.field, value)
    }

    /// Look up the id for a value.
    pub async fn get(&self, kv: &dyn KvStore, value: &str) -> StoreResult<Option<String>> {
        kv.get(&self.key(value)).await
    }

    /// Batch op that points `value` at `id`.
    pub fn put_op(&self, value: &str, id: &str) -> WriteOp {
        WriteOp::PutString {
            key: self.key(value),
            value: id.to_string(),
        }
    }

    /// Batch op that drops the entry for `value`.
    pub fn remove_op(&self, value: &str) -> WriteOp {
        WriteOp::Delete {
            key: self.key(value),
        }
    }
}

/// One-to-many mapping from a field value to a set of record ids.
#[derive(Debug, Clone, Copy)]
pub struct SetIndex {
    prefix: &'static str,
    field: &'static str,
}

impl SetIndex {
    pub const fn new(prefix: &'static str, field: &'static str) -> Self {
        Self { prefix, field }
    }

    pub fn key(&self, value: &str) -> String {
        format!("{}:index:{}:{}", self.prefix, self.field, value)
    }

    /// All ids filed under `value`.
    pub async fn members(&self, kv: &dyn KvStore, value: &str) -> StoreResult<Vec<String>> {
        kv.set_members(&self.key(value)).await
    }

    /// Batch op that files `id` under `value`.
    pub fn add_op(&self, value: &str, id: &str) -> WriteOp {
        WriteOp::AddToSet {
            key: self.key(value),
            member: id.to_string(),
        }
    }

    /// Batch op that removes `id` from under `value`.
    pub fn remove_op(&self, value: &str, id: &str) -> WriteOp {
        WriteOp::RemoveFromSet {
            key: self.key(value),
            member: id.to_string(),
        }
    }
}
