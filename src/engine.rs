use crate::config::EngineConfig;
use crate::error::{LsmError, Result};
use crate::manager::SstableManager;
use crate::memtable::Memtable;
use crate::record::WalOperation;
use crate::wal::Wal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

struct EngineInner {
    memtable: Memtable,
    manager: SstableManager,
}

/// Composes WAL, memtable, and SSTable manager into the public storage
/// engine. All public operations serialize under a single lock guarding
/// `memtable` and the run catalog together: public methods lock once and
/// call private helpers rather than re-entering it.
pub struct LsmEngine {
    inner: Mutex<EngineInner>,
    wal: Wal,
    config: EngineConfig,
}

impl LsmEngine {
    /// Opens (or creates) the engine at the paths named in `config`,
    /// replaying the WAL into the memtable before returning. If replay
    /// leaves the memtable over capacity, flushes once immediately.
    pub fn open(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let wal = Wal::open(config.wal_path())?;
        let manager = SstableManager::open(&config.data_dir, config.sstable_max_entries)?;
        let mut memtable = Memtable::new(config.memtable_max_entries);

        let replayed = wal.replay()?;
        for entry in &replayed {
            match entry.operation {
                WalOperation::Put => memtable.put(
                    entry.key.clone(),
                    entry.value.clone().unwrap_or(Value::Null),
                    entry.timestamp,
                    entry.sequence_number,
                ),
                WalOperation::Delete => {
                    memtable.delete(entry.key.clone(), entry.timestamp, entry.sequence_number)
                }
            }
        }

        info!(replayed = replayed.len(), "lsm engine recovered from wal");

        let mut inner = EngineInner { memtable, manager };
        if inner.memtable.is_full() {
            Self::flush_locked(&mut inner)?;
        }

        Ok(Self {
            inner: Mutex::new(inner),
            wal,
            config,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineInner>> {
        self.inner.lock().map_err(|_| LsmError::LockPoisoned("engine"))
    }

    /// Inserts or updates `key`. WAL-appends, flushes a memtable that was
    /// already full *before* this write lands (so a write that fills the
    /// memtable to capacity is observable at that size until the next
    /// write), then applies to the memtable and compacts if the run
    /// count has reached the configured threshold.
    pub fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut inner = self.lock()?;
        let (seq, ts) = self.wal.append(WalOperation::Put, key, Some(value.clone()))?;

        if inner.memtable.is_full() {
            Self::flush_locked(&mut inner)?;
        }
        inner.memtable.put(key.to_string(), value, ts, seq);
        self.maybe_compact(&mut inner)?;
        Ok(())
    }

    /// Point read: memtable (including tombstones) first, then runs
    /// newest-to-oldest, honoring the first tombstone encountered.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.lock()?;
        Ok(Self::get_locked(&inner, key))
    }

    fn get_locked(inner: &EngineInner, key: &str) -> Option<Value> {
        if let Some(entry) = inner.memtable.get(key) {
            return if entry.deleted {
                None
            } else {
                Some(entry.value.clone())
            };
        }
        for run in inner.manager.runs_newest_first() {
            if let Some(entry) = run.get(key) {
                return if entry.deleted {
                    None
                } else {
                    Some(entry.value.clone())
                };
            }
        }
        None
    }

    /// Writes a tombstone for `key`, reporting whether it existed prior
    /// to the delete. The tombstone is written unconditionally.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let existed = Self::get_locked(&inner, key).is_some();

        let (seq, ts) = self.wal.append(WalOperation::Delete, key, None)?;

        if inner.memtable.is_full() {
            Self::flush_locked(&mut inner)?;
        }
        inner.memtable.delete(key.to_string(), ts, seq);
        self.maybe_compact(&mut inner)?;
        Ok(existed)
    }

    /// All live keys, ascending, built by overlaying the memtable over
    /// runs newest-to-oldest.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        let inner = self.lock()?;
        Ok(Self::live_key_set(&inner).into_keys().collect())
    }

    /// `[start, end)` over the live key set, materialized via point
    /// lookups per key.
    pub fn range(&self, start: Option<&str>, end: Option<&str>) -> Result<BTreeMap<String, Value>> {
        let inner = self.lock()?;
        let mut result = BTreeMap::new();
        for key in Self::live_key_set(&inner).into_keys() {
            if start.map_or(false, |s| key.as_str() < s) {
                continue;
            }
            if end.map_or(false, |e| key.as_str() >= e) {
                break;
            }
            if let Some(value) = Self::get_locked(&inner, &key) {
                result.insert(key, value);
            }
        }
        Ok(result)
    }

    /// A live/absent verdict per key, newest occurrence wins: memtable,
    /// then runs newest-to-oldest.
    fn live_key_set(inner: &EngineInner) -> BTreeMap<String, bool> {
        let mut live: BTreeMap<String, bool> = BTreeMap::new();
        for entry in inner.memtable.sorted_entries() {
            live.insert(entry.key.clone(), !entry.deleted);
        }
        for run in inner.manager.runs_newest_first() {
            for entry in run.all_entries() {
                live.entry(entry.key.clone()).or_insert(!entry.deleted);
            }
        }
        live.into_iter().filter(|(_, alive)| *alive).map(|(k, _)| (k, true)).collect()
    }

    /// Flushes the memtable into a fresh run if non-empty; a no-op
    /// otherwise (repeated calls converge). Also checks the compaction
    /// trigger, so a flush that brings the run count to
    /// `compaction_threshold` compacts without a separate explicit call.
    pub fn force_flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        Self::flush_locked(&mut inner)?;
        self.maybe_compact(&mut inner)
    }

    fn flush_locked(inner: &mut EngineInner) -> Result<()> {
        if inner.memtable.is_empty() {
            return Ok(());
        }
        let entries: Vec<_> = inner.memtable.sorted_entries().cloned().collect();
        let table = inner.manager.create_run();
        table.load_sorted(entries)?;
        let flushed = inner.memtable.clear();
        info!(flushed, "memtable flushed to new sstable");
        Ok(())
    }

    /// Synchronously compacts, merging the oldest `compaction_threshold`
    /// runs into one.
    pub fn force_compact(&self) -> Result<()> {
        let mut inner = self.lock()?;
        Self::compact_locked(&mut inner, self.config.compaction_threshold)
    }

    fn maybe_compact(&self, inner: &mut EngineInner) -> Result<()> {
        if inner.manager.len() >= self.config.compaction_threshold {
            Self::compact_locked(inner, self.config.compaction_threshold)?;
        }
        Ok(())
    }

    fn compact_locked(inner: &mut EngineInner, threshold: usize) -> Result<()> {
        if inner.manager.len() < 2 {
            return Ok(());
        }
        let merge_count = threshold.min(inner.manager.len());
        inner.manager.merge_oldest(merge_count)?;
        inner.manager.cleanup_empty()?;
        Ok(())
    }

    /// Clears memtable, every run, and the WAL. Use with caution.
    pub fn clear_all(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.memtable.clear();
        for run in inner.manager.runs() {
            run.delete_file()?;
        }
        inner.manager = SstableManager::open(&self.config.data_dir, self.config.sstable_max_entries)?;
        self.wal.clear()?;
        info!("engine cleared");
        Ok(())
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let inner = self.lock()?;
        let runs = inner.manager.runs();
        let total_entries: usize = runs.iter().map(|r| r.size()).sum();
        let active_entries: usize = runs.iter().map(|r| r.active_entries()).sum();
        let details = runs
            .iter()
            .map(|r| SstableDetail {
                table_id: r.table_id,
                total_entries: r.size(),
                active_entries: r.active_entries(),
                is_full: r.is_full(),
            })
            .collect();

        Ok(EngineStats {
            memtable: MemtableStats {
                size: inner.memtable.size(),
                max_size: inner.memtable.max_entries(),
                is_full: inner.memtable.is_full(),
            },
            sstables: SstableStats {
                count: runs.len(),
                total_entries,
                active_entries,
                details,
            },
            wal: self.wal.stats()?,
            total_active_keys: Self::live_key_set(&inner).len(),
            compaction_threshold: self.config.compaction_threshold,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MemtableStats {
    pub size: usize,
    pub max_size: usize,
    pub is_full: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SstableDetail {
    pub table_id: u64,
    pub total_entries: usize,
    pub active_entries: usize,
    pub is_full: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SstableStats {
    pub count: usize,
    pub total_entries: usize,
    pub active_entries: usize,
    pub details: Vec<SstableDetail>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineStats {
    pub memtable: MemtableStats,
    pub sstables: SstableStats,
    pub wal: crate::wal::WalStats,
    pub total_active_keys: usize,
    pub compaction_threshold: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::json;
    use tempfile::tempdir;

    fn engine_in(dir: &std::path::Path, memtable_max: usize, compaction_threshold: usize) -> LsmEngine {
        let config = EngineConfig::builder()
            .data_dir(dir.join("data"))
            .wal_file(dir.join("wal.log"))
            .memtable_max_entries(memtable_max)
            .sstable_max_entries(memtable_max)
            .compaction_threshold(compaction_threshold)
            .build()
            .unwrap();
        LsmEngine::open(config).unwrap()
    }

    #[test]
    fn basic_put_get_delete() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 30, 5);

        engine.put("a", json!(1)).unwrap();
        assert_eq!(engine.get("a").unwrap(), Some(json!(1)));

        engine.put("a", json!(2)).unwrap();
        assert_eq!(engine.get("a").unwrap(), Some(json!(2)));

        assert!(engine.delete("a").unwrap());
        assert_eq!(engine.get("a").unwrap(), None);
        assert!(!engine.delete("a").unwrap());
    }

    #[test]
    fn flush_boundary_at_capacity() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 30, 100);

        for i in 0..30 {
            engine.put(&format!("k{i:02}"), json!(i)).unwrap();
        }
        let stats = engine.stats().unwrap();
        assert_eq!(stats.memtable.size, 30);
        assert!(stats.memtable.is_full);
        assert_eq!(stats.sstables.count, 0);

        engine.put("k30", json!(30)).unwrap();
        let stats = engine.stats().unwrap();
        assert_eq!(stats.memtable.size, 1);
        assert_eq!(stats.sstables.count, 1);
        for i in 0..31 {
            let key = if i < 30 { format!("k{i:02}") } else { "k30".to_string() };
            assert!(engine.get(&key).unwrap().is_some());
        }
    }

    #[test]
    fn tombstone_shadows_across_flush() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 1, 100);

        engine.put("x", json!("v")).unwrap();
        engine.force_flush().unwrap();
        engine.delete("x").unwrap();
        engine.force_flush().unwrap();

        assert_eq!(engine.get("x").unwrap(), None);
        assert_eq!(engine.stats().unwrap().sstables.count, 2);
    }

    #[test]
    fn compaction_keeps_newest_value() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 30, 2);

        engine.put("a", json!(1)).unwrap();
        engine.force_flush().unwrap();
        engine.put("a", json!(2)).unwrap();
        engine.force_flush().unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.sstables.count, 1);
        assert_eq!(engine.get("a").unwrap(), Some(json!(2)));
    }

    #[test]
    fn range_spans_memtable_and_runs() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 5, 100);

        for k in ["a", "b", "c", "d", "e"] {
            engine.put(k, json!(k)).unwrap();
        }
        engine.force_flush().unwrap();
        for k in ["f", "g"] {
            engine.put(k, json!(k)).unwrap();
        }

        let result = engine.range(Some("b"), Some("f")).unwrap();
        let keys: Vec<&String> = result.keys().collect();
        assert_eq!(keys, vec!["b", "c", "d", "e"]);
    }

    #[test]
    fn wal_recovery_replays_after_restart() {
        let dir = tempdir().unwrap();
        {
            let engine = engine_in(dir.path(), 100, 100);
            engine.put("k1", json!("v1")).unwrap();
            engine.put("k2", json!("v2")).unwrap();
            engine.delete("k1").unwrap();
            engine.put("k3", json!("v3")).unwrap();
        }

        let engine = engine_in(dir.path(), 100, 100);
        assert_eq!(engine.get("k1").unwrap(), None);
        assert_eq!(engine.get("k2").unwrap(), Some(json!("v2")));
        assert_eq!(engine.get("k3").unwrap(), Some(json!("v3")));

        let stats = engine.stats().unwrap();
        assert_eq!(stats.wal.total_entries, 4);
        assert_eq!(stats.wal.current_sequence, 4);
    }

    #[test]
    fn force_flush_on_empty_memtable_is_noop() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 30, 100);
        engine.force_flush().unwrap();
        engine.force_flush().unwrap();
        assert_eq!(engine.stats().unwrap().sstables.count, 0);
    }

    #[test]
    fn clear_all_resets_everything() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), 1, 2);
        engine.put("a", json!(1)).unwrap();
        engine.put("b", json!(2)).unwrap();
        engine.clear_all().unwrap();

        assert_eq!(engine.all_keys().unwrap().len(), 0);
        let stats = engine.stats().unwrap();
        assert_eq!(stats.sstables.count, 0);
        assert_eq!(stats.wal.total_entries, 0);
    }
}
