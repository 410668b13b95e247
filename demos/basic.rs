use lsm_kv_store::EngineConfig;
use serde_json::json;
use tempfile::tempdir;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let config = EngineConfig::builder()
        .data_dir(dir.path())
        .memtable_max_entries(4)
        .build()?;

    let store = lsm_kv_store::KeyValueStore::open(config)?;
    store.put("hello", json!("world"))?;

    let v = store.get("hello")?;
    println!("GET hello = {v:?}");

    Ok(())
}
