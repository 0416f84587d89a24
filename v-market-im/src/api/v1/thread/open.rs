use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::{OpenThreadRequest, OpenThreadResponse};
use crate::VMarketIMServer;

// 路由注册入口（POST）
// Route registration entry (POST)
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(open_thread_handle)));
}

// 打开或创建会话
// Open or create a thread
pub async fn open_thread_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
    body: web::Json<OpenThreadRequest>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let thread_id = server
        .service
        .open_or_create_thread(&user, &body.counterpart_id, body.product_id.as_deref())
        .await?;
    Ok(respond_any(StatusCode::OK, OpenThreadResponse { thread_id }))
}
