#[cfg(feature = "web_actix")]
use actix_web::{http::StatusCode, HttpResponse};

// 通用响应（结构体自动转 JSON，失败则原样文本）
// Generic response: auto JSON from struct, fallback to debug text
#[cfg(feature = "web_actix")]
pub fn respond_any<T: serde::Serialize + std::fmt::Debug>(code: StatusCode, data: T) -> HttpResponse {
    match serde_json::to_value(&data) {
        Ok(v) => HttpResponse::build(code).json(v),
        Err(_) => HttpResponse::build(code)
            .content_type("text/plain; charset=utf-8")
            .body(format!("{:?}", data)),
    }
}

#[cfg(all(test, feature = "web_actix"))]
mod tests {
    use super::*;

    #[test]
    fn json_body_keeps_status() {
        let resp = respond_any(StatusCode::CREATED, serde_json::json!({"thread_id": "t1"}));
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
}
