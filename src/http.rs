use actix_cors::Cors;
use actix_web::{delete, get, post, put, web, App, HttpResponse, HttpServer, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::facade::KeyValueStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_json_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_json_payload_size: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);
        Self {
            host,
            port,
            ..Self::default()
        }
    }
}

pub struct AppState {
    pub store: Arc<KeyValueStore>,
}

#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl ApiResponse {
    fn ok(message: impl Into<String>, data: Option<serde_json::Value>) -> HttpResponse {
        HttpResponse::Ok().json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }

    fn error(message: impl Into<String>) -> HttpResponse {
        HttpResponse::InternalServerError().json(Self {
            success: false,
            message: message.into(),
            data: None,
        })
    }
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[get("/health")]
async fn health(data: web::Data<AppState>) -> impl Responder {
    match data.store.health_check() {
        Ok(health) => {
            let status = if health.status == "healthy" {
                HttpResponse::Ok()
            } else {
                HttpResponse::ServiceUnavailable()
            };
            status.json(health)
        }
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[get("/stats")]
async fn stats(data: web::Data<AppState>) -> impl Responder {
    match data.store.get_stats() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[get("/keys/{key}")]
async fn get_key(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let key = path.into_inner();
    match data.store.read(&key) {
        Ok(Some(value)) => ApiResponse::ok("key found", Some(serde_json::json!({ "key": key, "value": value }))),
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::not_found_body(&key)),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

impl ApiResponse {
    fn not_found_body(key: &str) -> Self {
        Self {
            success: false,
            message: format!("key '{key}' not found"),
            data: None,
        }
    }
}

#[put("/keys/{key}")]
async fn put_key(
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
    data: web::Data<AppState>,
) -> impl Responder {
    let key = path.into_inner();
    match data.store.put(&key, body.into_inner()) {
        Ok(()) => ApiResponse::ok(format!("key '{key}' set"), Some(serde_json::json!({ "key": key }))),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[delete("/keys/{key}")]
async fn delete_key(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let key = path.into_inner();
    match data.store.delete(&key) {
        Ok(existed) => ApiResponse::ok(
            format!("key '{key}' delete processed"),
            Some(serde_json::json!({ "existed": existed })),
        ),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[get("/range")]
async fn range(query: web::Query<RangeQuery>, data: web::Data<AppState>) -> impl Responder {
    match data.store.get_range(query.start.as_deref(), query.end.as_deref()) {
        Ok(items) => ApiResponse::ok(format!("{} keys found", items.len()), Some(serde_json::json!({ "items": items }))),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[get("/keys")]
async fn list_keys(data: web::Data<AppState>) -> impl Responder {
    match data.store.get_all_keys() {
        Ok(keys) => ApiResponse::ok(format!("{} keys found", keys.len()), Some(serde_json::json!({ "keys": keys }))),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[post("/clear")]
async fn clear(data: web::Data<AppState>) -> impl Responder {
    match data.store.clear() {
        Ok(()) => ApiResponse::ok("store cleared", None),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[post("/flush")]
async fn flush(data: web::Data<AppState>) -> impl Responder {
    match data.store.force_flush() {
        Ok(()) => ApiResponse::ok("memtable flushed", None),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

#[post("/compact")]
async fn compact(data: web::Data<AppState>) -> impl Responder {
    match data.store.force_compaction() {
        Ok(()) => ApiResponse::ok("compaction complete", None),
        Err(e) => ApiResponse::error(e.to_string()),
    }
}

pub async fn start_server(store: KeyValueStore, server_config: ServerConfig) -> std::io::Result<()> {
    let store = Arc::new(store);
    let host = server_config.host.clone();
    let port = server_config.port;
    let max_json = server_config.max_json_payload_size;

    tracing::info!(%host, port, "starting lsm-kv-store http server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(AppState { store: Arc::clone(&store) }))
            .app_data(web::JsonConfig::default().limit(max_json))
            .service(health)
            .service(stats)
            .service(get_key)
            .service(put_key)
            .service(delete_key)
            .service(range)
            .service(list_keys)
            .service(clear)
            .service(flush)
            .service(compact)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
