//! # Record Store
//!
//! Generic persistence for flat entity records. Each record is one
//! hash at `"{prefix}:{id}"`; every field holds the JSON encoding of
//! its value, so strings, numbers, booleans, timestamps and enums all
//! round-trip through one codec. Keys under `"{prefix}:index:"` belong
//! to the secondary indexes and are excluded from scans.
//!
//! `all` walks the prefix with SCAN and loads each record; cost is
//! linear in the number of records, which is fine at the data sizes
//! this serves.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::kv::KvStore;

/// A flat record owned by a typed store.
///
/// Entities serialize to a JSON object whose members become the hash
/// fields. Timestamp accessors exist so [`touch`] can enforce the
/// update-ordering invariant generically.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Key prefix, e.g. `"message"` for keys `message:{id}`.
    const PREFIX: &'static str;

    fn id(&self) -> &str;

    fn updated_at(&self) -> DateTime<Utc>;

    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Storage key for an entity id.
pub fn record_key<T: Entity>(id: &str) -> String {
    format!("{}:{}", T::PREFIX, id)
}

/// Bump `updated_at` for a patched record.
///
/// `updated_at` must strictly increase across successive updates even
/// when two patches land inside one clock tick, so the bump falls back
/// to one nanosecond past the previous value.
pub fn touch<T: Entity>(entity: &mut T) {
    let now = Utc::now();
    let previous = entity.updated_at();
    let next = if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    };
    entity.set_updated_at(next);
}

/// Encode an entity into hash fields.
///
/// Null members (cleared optionals) are dropped; combined with the
/// replace semantics of `WriteOp::PutHash` the stored hash always
/// mirrors the struct exactly.
pub fn encode_fields<T: Entity>(entity: &T) -> StoreResult<Vec<(String, String)>> {
    let value =
        serde_json::to_value(entity).map_err(|err| StoreError::Corrupt(err.to_string()))?;
    let Value::Object(members) = value else {
        return Err(StoreError::Corrupt(format!(
            "{} record did not serialize to an object",
            T::PREFIX
        )));
    };

    let mut fields = Vec::with_capacity(members.len());
    for (name, member) in members {
        if member.is_null() {
            continue;
        }
        let raw =
            serde_json::to_string(&member).map_err(|err| StoreError::Corrupt(err.to_string()))?;
        fields.push((name, raw));
    }
    Ok(fields)
}

/// Decode hash fields back into an entity.
///
/// A field that is not valid JSON is taken as a raw string, which keeps
/// hashes written by earlier tooling readable.
pub fn decode_fields<T: Entity>(fields: Vec<(String, String)>) -> StoreResult<T> {
    let mut members = serde_json::Map::with_capacity(fields.len());
    for (name, raw) in fields {
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        members.insert(name, value);
    }
    serde_json::from_value(Value::Object(members)).map_err(|err| {
        StoreError::Corrupt(format!("{} record failed to decode: {err}", T::PREFIX))
    })
}

/// Read access to the records of one entity type.
///
/// Writes go through `WriteBatch`es built by the typed stores so index
/// maintenance always travels with the record mutation.
pub struct RecordStore<T: Entity> {
    kv: Arc<dyn KvStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> RecordStore<T> {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            _entity: PhantomData,
        }
    }

    /// Storage key for an id.
    pub fn key(id: &str) -> String {
        record_key::<T>(id)
    }

    /// Load one record.
    pub async fn find(&self, id: &str) -> StoreResult<Option<T>> {
        match self.kv.hash_get_all(&Self::key(id)).await? {
            Some(fields) => Ok(Some(decode_fields(fields)?)),
            None => Ok(None),
        }
    }

    /// Load every record under the prefix.
    pub async fn all(&self) -> StoreResult<Vec<T>> {
        let prefix = format!("{}:", T::PREFIX);
        let keys = self.kv.scan_keys(&prefix).await?;
        let mut records = Vec::new();
        for key in keys {
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            // Ids never contain ':'; anything that does is an index key.
            if id.contains(':') {
                continue;
            }
            if let Some(fields) = self.kv.hash_get_all(&key).await? {
                records.push(decode_fields(fields)?);
            }
        }
        Ok(records)
    }
}
