use actix_web::http::StatusCode;
use actix_web::{web, Responder};
use std::sync::Arc;
use v::response::respond_any;
use v::HealthCheck;

use crate::VMarketIMServer;

// 路由注册入口（GET）
// Route registration entry (GET)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_basic_handle)));
}

// 基础健康检查（存储连通性）
// Basic health check (store connectivity)
pub async fn health_basic_handle(server: web::Data<Arc<VMarketIMServer>>) -> impl Responder {
    let status = server.check_health().await;
    let code = if status.healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    respond_any(code, status)
}
