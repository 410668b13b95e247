use lsm_kv_store::{EngineConfig, KeyValueStore};
use serde_json::json;
use tempfile::tempdir;

fn store_with(dir: &std::path::Path, memtable_max: usize, compaction_threshold: usize) -> KeyValueStore {
    let config = EngineConfig::builder()
        .data_dir(dir)
        .memtable_max_entries(memtable_max)
        .sstable_max_entries(memtable_max)
        .compaction_threshold(compaction_threshold)
        .build()
        .unwrap();
    KeyValueStore::open(config).unwrap()
}

#[test]
fn compaction_merges_newest_value_wins_across_runs() {
    let dir = tempdir().unwrap();
    let store = store_with(dir.path(), 1, 2);

    store.put("a", json!(1)).unwrap();
    store.put("a", json!(2)).unwrap();
    store.put("a", json!(3)).unwrap();

    let stats = store.get_stats().unwrap();
    assert!(stats.engine.sstables.count <= 2);
    assert_eq!(store.get("a").unwrap(), Some(json!(3)));
}

#[test]
fn compaction_drops_tombstones_when_all_sharing_runs_merge() {
    let dir = tempdir().unwrap();
    let store = store_with(dir.path(), 1, 2);

    store.put("a", json!(1)).unwrap();
    store.delete("a").unwrap();
    store.force_compaction().unwrap();

    assert_eq!(store.get("a").unwrap(), None);
    assert!(!store.get_all_keys().unwrap().contains(&"a".to_string()));
}

#[test]
fn range_query_spans_memtable_and_multiple_runs() {
    let dir = tempdir().unwrap();
    let store = store_with(dir.path(), 2, 100);

    for k in ["a", "b", "c", "d"] {
        store.put(k, json!(k)).unwrap();
    }
    store.put("e", json!("e")).unwrap();

    let range = store.get_range(Some("b"), Some("e")).unwrap();
    let keys: Vec<&String> = range.keys().collect();
    assert_eq!(keys, vec!["b", "c", "d"]);
}

#[test]
fn repeated_force_compaction_converges() {
    let dir = tempdir().unwrap();
    let store = store_with(dir.path(), 1, 2);

    for i in 0..10 {
        store.put(&format!("k{i}"), json!(i)).unwrap();
    }
    store.force_compaction().unwrap();
    let count_after_first = store.get_stats().unwrap().engine.sstables.count;
    store.force_compaction().unwrap();
    let count_after_second = store.get_stats().unwrap().engine.sstables.count;
    assert!(count_after_second <= count_after_first);

    for i in 0..10 {
        assert_eq!(store.get(&format!("k{i}")).unwrap(), Some(json!(i)));
    }
}

#[test]
fn clear_then_reopen_starts_empty() {
    let dir = tempdir().unwrap();
    {
        let store = store_with(dir.path(), 1, 2);
        store.put("a", json!(1)).unwrap();
        store.put("b", json!(2)).unwrap();
        store.clear().unwrap();
    }

    let store = store_with(dir.path(), 1, 2);
    assert!(store.is_empty().unwrap());
}
