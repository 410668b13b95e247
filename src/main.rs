use lsm_kv_store::EngineConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = EngineConfig::builder()
        .data_dir("/var/lib/lsm_kv_store/data")
        .build()?;

    let store = lsm_kv_store::KeyValueStore::open(config)?;
    let stats = store.get_stats()?;
    println!(
        "lsm-kv-store ready: {} keys, {} sstables, {} wal entries",
        stats.total_keys, stats.engine.sstables.count, stats.engine.wal.total_entries
    );
    Ok(())
}
