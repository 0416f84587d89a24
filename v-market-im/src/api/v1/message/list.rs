use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::MessageListResponse;
use crate::VMarketIMServer;

#[derive(Deserialize, Debug)]
pub struct ListQuery {
    /// 已持有的最后 seq / Seq of the last message already held
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

// 按 seq 升序拉取会话消息
// List thread messages ascending by seq
pub async fn list_messages_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
    path: web::Path<String>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let thread_id = path.into_inner();
    let items = server
        .service
        .list_messages(&user, &thread_id, query.since, query.limit)
        .await?;
    Ok(respond_any(StatusCode::OK, MessageListResponse { thread_id, items }))
}
