use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::SendMessageRequest;
use crate::VMarketIMServer;

// 发送消息（暂时性故障返回 503，不自动重试）
// Send a message (transient failures return 503 and are never retried)
pub async fn send_message_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let message = server
        .service
        .send_message(&user, &path.into_inner(), &body.content)
        .await?;
    Ok(respond_any(StatusCode::CREATED, message))
}
