use actix_web::web;

pub mod list;
pub mod read;
pub mod send;

/// 拉取（GET）与发送（POST）共用一个资源路径
/// List (GET) and send (POST) share one resource path
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::resource(path)
            .route(web::get().to(list::list_messages_handle))
            .route(web::post().to(send::send_message_handle)),
    );
}
