use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use v::http::HttpError;
use v::response::respond_any;

use crate::api::identity::current_user;
use crate::domain::{ContactListResponse, Role};
use crate::VMarketIMServer;

#[derive(Deserialize, Debug)]
pub struct ContactQuery {
    /// 只保留该角色的对方（管理员的买家/卖家标签页）
    /// Keep counterparts of this role only (the admin's buyer/seller tabs)
    pub role: Option<String>,
}

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(contact_list_handle)));
}

// 联系人列表
// Contact list
pub async fn contact_list_handle(
    req: HttpRequest,
    server: web::Data<Arc<VMarketIMServer>>,
    query: web::Query<ContactQuery>,
) -> Result<HttpResponse, HttpError> {
    let user = current_user(&req, &server).await?;
    let role_filter = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Some(
            raw.parse::<Role>()
                .map_err(|e| HttpError::validation("Contact", "role", "invalid_role", e))?,
        ),
        None => None,
    };
    let items = server.service.list_contacts(&user, role_filter).await?;
    let count = items.len();
    Ok(respond_any(StatusCode::OK, ContactListResponse { items, count }))
}
