use lsm_kv_store::{EngineConfig, KeyValueStore};
use std::env;
use std::io;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "./.lsm_data".to_string());
    let server_config = lsm_kv_store::http::ServerConfig::from_env();

    let config = EngineConfig::builder()
        .data_dir(&data_dir)
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    tracing::info!(data_dir = %data_dir, "opening key-value store");
    let store = match KeyValueStore::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "failed to open key-value store");
            return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
        }
    };

    lsm_kv_store::http::start_server(store, server_config).await
}
