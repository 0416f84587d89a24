use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use v::http::HttpError;

use crate::domain::UserProfile;
use crate::service::auth::token_from_headers;
use crate::VMarketIMServer;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// 解析当前请求的用户 / Resolve the user behind the current request
pub async fn current_user(req: &HttpRequest, server: &VMarketIMServer) -> Result<UserProfile, HttpError> {
    let headers = req.headers();
    let token = token_from_headers(
        headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
        headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()),
    )
    .ok_or_else(|| HttpError::Unauthorized("missing credentials".to_string()))?;
    Ok(server.identity.resolve(&token).await?)
}
