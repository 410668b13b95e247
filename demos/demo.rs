use lsm_kv_store::{EngineConfig, Result};
use serde_json::json;
use tempfile::tempdir;

fn main() -> Result<()> {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().to_path_buf();

    println!("=== Part 1: Creating key-value store ===");
    let config = EngineConfig::builder()
        .data_dir(path.clone())
        .memtable_max_entries(10)
        .build()?;

    let db = lsm_kv_store::KeyValueStore::open(config)?;

    println!("Inserting keys...");
    db.put("apple", json!("A red fruit"))?;
    db.put("banana", json!("A yellow fruit"))?;
    db.put("cherry", json!("A small red fruit"))?;

    if let Some(value) = db.get("apple")? {
        println!("apple: {value}");
    }
    if let Some(value) = db.get("banana")? {
        println!("banana: {value}");
    }

    println!("\nUpdating 'banana'...");
    db.update("banana", json!("A VERY yellow fruit"))?;
    if let Some(value) = db.get("banana")? {
        println!("banana (updated): {value}");
    }

    println!("\nDeleting 'cherry'...");
    db.delete("cherry")?;
    match db.get("cherry")? {
        Some(_) => println!("cherry: still exists (unexpected!)"),
        None => println!("cherry: deleted"),
    }

    println!("\n=== Part 2: Adding data (automatic flush will occur) ===");
    for i in 0..100 {
        db.put(&format!("key_{i:03}"), json!(format!("value_{i}")))?;
    }
    println!("Data inserted (memtable flushes automatically when full)");

    if let Some(value) = db.get("key_042")? {
        println!("key_042: {value}");
    }
    if let Some(value) = db.get("apple")? {
        println!("apple: {value}");
    }

    println!("\n=== Part 3: Adding more data (compaction may trigger) ===");
    for i in 100..200 {
        db.put(&format!("key_{i:03}"), json!(format!("value_{i}")))?;
    }
    println!("Total keys in database: {}", db.count()?);

    println!("\n=== Part 4: Reopening database ===");
    drop(db);

    let config2 = EngineConfig::builder()
        .data_dir(path)
        .memtable_max_entries(10)
        .build()?;
    let db2 = lsm_kv_store::KeyValueStore::open(config2)?;

    if let Some(value) = db2.get("apple")? {
        println!("apple (after reopen): {value}");
    }
    if let Some(value) = db2.get("key_042")? {
        println!("key_042 (after reopen): {value}");
    }
    if let Some(value) = db2.get("key_150")? {
        println!("key_150 (after reopen): {value}");
    }

    println!("\nDemo complete.");
    Ok(())
}
