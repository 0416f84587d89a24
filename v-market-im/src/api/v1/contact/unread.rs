use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::UnreadResponse;
use crate::VMarketIMServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(unread_total_handle)));
}

// 未读总数（角标）
// Unread total (badge count)
pub async fn unread_total_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let unread = server.service.unread_total(&user).await?;
    Ok(respond_any(StatusCode::OK, UnreadResponse { uid: user.id, unread }))
}
