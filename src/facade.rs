use crate::config::EngineConfig;
use crate::engine::{EngineStats, LsmEngine};
use crate::error::{LsmError, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// The public CRUD surface over [`LsmEngine`]. Validates key shape,
/// distinguishes create/update from the upsert `put`, and adds batch and
/// health-check conveniences on top of the engine's primitive
/// get/put/delete/range.
pub struct KeyValueStore {
    engine: LsmEngine,
    data_dir: std::path::PathBuf,
    wal_path: std::path::PathBuf,
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LsmError::InvalidArgument(
            "key must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

impl KeyValueStore {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let wal_path = config.wal_path();
        let engine = LsmEngine::open(config)?;
        let store = Self {
            engine,
            data_dir,
            wal_path,
        };
        let stats = store.get_stats()?;
        info!(
            keys = stats.total_active_keys,
            sstables = stats.sstables.count,
            wal_entries = stats.wal.total_entries,
            "key-value store ready"
        );
        Ok(store)
    }

    /// Inserts `key` only if it does not already exist.
    pub fn create(&self, key: &str, value: Value) -> Result<bool> {
        validate_key(key)?;
        if self.engine.get(key)?.is_some() {
            return Ok(false);
        }
        self.engine.put(key, value)?;
        Ok(true)
    }

    pub fn read(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        self.engine.get(key)
    }

    /// Alias for [`KeyValueStore::read`].
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.read(key)
    }

    /// Overwrites `key` only if it already exists.
    pub fn update(&self, key: &str, value: Value) -> Result<bool> {
        validate_key(key)?;
        if self.engine.get(key)?.is_none() {
            return Ok(false);
        }
        self.engine.put(key, value)?;
        Ok(true)
    }

    /// Upsert: creates `key` if absent, overwrites it if present.
    pub fn put(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        self.engine.put(key, value)
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.engine.delete(key)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }

    pub fn get_all_keys(&self) -> Result<Vec<String>> {
        self.engine.all_keys()
    }

    pub fn get_range(&self, start: Option<&str>, end: Option<&str>) -> Result<BTreeMap<String, Value>> {
        self.engine.range(start, end)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.get_all_keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        self.engine.clear_all()?;
        info!("key-value store cleared");
        Ok(())
    }

    pub fn force_flush(&self) -> Result<()> {
        self.engine.force_flush()
    }

    pub fn force_compaction(&self) -> Result<()> {
        self.engine.force_compact()
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let engine_stats = self.engine.stats()?;
        Ok(StoreStats {
            total_keys: engine_stats.total_active_keys,
            data_directory: self.data_dir.display().to_string(),
            wal_file: self.wal_path.display().to_string(),
            engine: engine_stats,
        })
    }

    /// Reports overall health plus the individual checks it was derived
    /// from.
    pub fn health_check(&self) -> Result<HealthStatus> {
        let stats = self.get_stats()?;
        let checks = HealthChecks {
            wal_accessible: self.wal_path.exists(),
            data_dir_accessible: self.data_dir.exists(),
            memtable_operational: true,
            sstables_accessible: true,
        };
        let status = if checks.wal_accessible && checks.data_dir_accessible {
            "healthy"
        } else {
            "unhealthy"
        };
        Ok(HealthStatus {
            status: status.to_string(),
            timestamp: Utc::now(),
            checks,
            stats,
        })
    }

    pub fn batch_put(&self, items: BTreeMap<String, Value>) -> BTreeMap<String, bool> {
        items
            .into_iter()
            .map(|(key, value)| {
                let ok = self.put(&key, value).is_ok();
                (key, ok)
            })
            .collect()
    }

    pub fn batch_get(&self, keys: &[String]) -> BTreeMap<String, Option<Value>> {
        keys.iter()
            .map(|key| (key.clone(), self.read(key).unwrap_or(None)))
            .collect()
    }

    pub fn batch_delete(&self, keys: &[String]) -> BTreeMap<String, bool> {
        keys.iter()
            .map(|key| (key.clone(), self.delete(key).unwrap_or(false)))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StoreStats {
    pub total_keys: usize,
    pub data_directory: String,
    pub wal_file: String,
    #[serde(flatten)]
    pub engine: EngineStats,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthChecks {
    pub wal_accessible: bool,
    pub data_dir_accessible: bool,
    pub memtable_operational: bool,
    pub sstables_accessible: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub checks: HealthChecks,
    pub stats: StoreStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> KeyValueStore {
        let config = EngineConfig::builder()
            .data_dir(dir.join("data"))
            .wal_file(dir.join("wal.log"))
            .build()
            .unwrap();
        KeyValueStore::open(config).unwrap()
    }

    #[test]
    fn create_rejects_existing_key() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.create("a", json!(1)).unwrap());
        assert!(!store.create("a", json!(2)).unwrap());
        assert_eq!(store.read("a").unwrap(), Some(json!(1)));
    }

    #[test]
    fn update_rejects_missing_key() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.update("missing", json!(1)).unwrap());
        store.put("present", json!(1)).unwrap();
        assert!(store.update("present", json!(2)).unwrap());
        assert_eq!(store.read("present").unwrap(), Some(json!(2)));
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(matches!(
            store.put("   ", json!(1)),
            Err(LsmError::InvalidArgument(_))
        ));
    }

    #[test]
    fn batch_operations_report_per_key_outcome() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let mut items = BTreeMap::new();
        items.insert("a".to_string(), json!(1));
        items.insert("b".to_string(), json!(2));
        let results = store.batch_put(items);
        assert_eq!(results.get("a"), Some(&true));
        assert_eq!(results.get("b"), Some(&true));

        let values = store.batch_get(&["a".to_string(), "missing".to_string()]);
        assert_eq!(values.get("a").unwrap(), &Some(json!(1)));
        assert_eq!(values.get("missing").unwrap(), &None);

        let deleted = store.batch_delete(&["a".to_string(), "missing".to_string()]);
        assert_eq!(deleted.get("a"), Some(&true));
        assert_eq!(deleted.get("missing"), Some(&false));
    }

    #[test]
    fn count_and_is_empty_track_live_keys() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.is_empty().unwrap());
        store.put("a", json!(1)).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn health_check_reports_healthy_when_directories_exist() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let health = store.health_check().unwrap();
        assert_eq!(health.status, "healthy");
    }
}
