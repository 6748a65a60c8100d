//! Storage layer: a thin key-value abstraction with typed records and
//! secondary indexes on top.
//!
//! Production runs against Redis through [`RedisStore`]; tests run
//! against the in-process [`MemoryStore`]. Everything above this module
//! talks to `dyn KvStore` and cannot tell the two apart.

pub mod errors;
pub mod index;
pub mod kv;
pub mod memory;
pub mod records;
pub mod redis;

pub use errors::{StoreError, StoreResult};
pub use index::{SetIndex, UniqueIndex};
pub use kv::{KvStore, WriteBatch, WriteOp};
pub use memory::MemoryStore;
pub use records::{decode_fields, encode_fields, record_key, touch, Entity, RecordStore};
pub use redis::RedisStore;
