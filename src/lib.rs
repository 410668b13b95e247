//! Embedded, persistent, ordered key-value store built on an LSM tree.
//!
//! Components:
//! - [`memtable`]: in-memory ordered write buffer
//! - [`wal`]: write-ahead log for crash recovery
//! - [`sstable`] / [`manager`]: immutable on-disk runs and their catalog
//! - [`engine`]: composes the above into the storage engine
//! - [`facade`]: the public CRUD surface
//! - [`http`]: optional thin HTTP façade (feature `api`)

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod manager;
pub mod memtable;
pub mod record;
pub mod sstable;
pub mod wal;

#[cfg(feature = "api")]
pub mod http;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{EngineStats, LsmEngine};
pub use error::{LsmError, Result};
pub use facade::{HealthStatus, KeyValueStore, StoreStats};
pub use record::Entry;

/// Convenience constructor mirroring the reference implementation's
/// `create_kv_store` factory: a store rooted at `data_dir`, WAL alongside
/// it, all other tunables at their defaults.
pub fn create_kv_store(data_dir: impl Into<std::path::PathBuf>) -> Result<KeyValueStore> {
    let config = EngineConfig::builder().data_dir(data_dir).build()?;
    KeyValueStore::open(config)
}
