use actix_web::web;

/// 路由配置 / Route configuration
pub fn configure(cfg: &mut web::ServiceConfig) {
    // 健康检查 / Health checks
    crate::api::v1::health::basic::register(cfg, "/v1/health");
    crate::api::v1::health::live::register(cfg, "/v1/health/live");
    crate::api::v1::health::ready::register(cfg, "/v1/health/ready");

    // 会话与消息 / Threads and messages
    crate::api::v1::thread::open::register(cfg, "/v1/threads");
    crate::api::v1::message::register(cfg, "/v1/threads/{thread_id}/messages");
    crate::api::v1::message::read::register(cfg, "/v1/threads/{thread_id}/read");

    // 联系人 / Contacts
    crate::api::v1::contact::unread::register(cfg, "/v1/contacts/unread");
    crate::api::v1::contact::list::register(cfg, "/v1/contacts");
}
