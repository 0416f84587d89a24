use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::MarkReadResponse;
use crate::VMarketIMServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(read_mark_handle)));
}

// 标记会话已读（幂等）
// Mark the thread read (idempotent)
pub async fn read_mark_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
    path: web::Path<String>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let thread_id = path.into_inner();
    let marked = server.service.mark_thread_read(&user, &thread_id).await?;
    Ok(respond_any(StatusCode::OK, MarkReadResponse { thread_id, marked }))
}
