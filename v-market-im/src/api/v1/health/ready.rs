use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use std::sync::Arc;
use v::response::respond_any;

use crate::VMarketIMServer;

// 路由注册入口（GET）
// Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_ready_handle)));
}

// 就绪检查：存储可用才就绪
// Readiness check: ready only when the store answers
pub async fn health_ready_handle(server: web::Data<Arc<VMarketIMServer>>) -> impl Responder {
    let store_ok = server.service.store().ping().await.is_ok();
    let payload = serde_json::json!({
        "ready": store_ok,
        "service": "v-market-im",
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "online_clients": server.online_count(),
        "topics": server.service.notifier().topic_count()
    });
    let code = if store_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    respond_any(code, payload)
}
