use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::participant::Role;

/// 会话消息 / Thread message
///
/// 创建后只允许接收方翻转 `is_read`
/// Immutable after creation except for the receiver flipping `is_read`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    /// 会话内递增序号，作为增量拉取游标 / Per-thread sequence, the incremental cursor
    pub seq: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    /// 毫秒时间戳，会话内严格递增 / Unix millis, strictly increasing per thread
    pub created_at: i64,
    pub is_read: bool,
}

/// 待写入的消息（由存储分配 id/seq/时间戳）
/// Message about to be written (store assigns id, seq and timestamp)
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub thread_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

/// 联系人（派生视图，不落库）/ Contact (derived view, never stored)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct Contact {
    pub counterpart_id: String,
    pub counterpart_name: String,
    pub counterpart_role: Option<Role>,
    pub thread_id: String,
    pub product_id: Option<String>,
    pub last_message_preview: String,
    pub last_activity_at: i64,
    pub unread_count: usize,
}

// ---------------------------------------------------------------------------
// HTTP 请求/响应 / HTTP requests and responses
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct OpenThreadRequest {
    pub counterpart_id: String,
    pub product_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct OpenThreadResponse {
    pub thread_id: String,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct MessageListResponse {
    pub thread_id: String,
    pub items: Vec<Message>,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct MarkReadResponse {
    pub thread_id: String,
    pub marked: usize,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct ContactListResponse {
    pub items: Vec<Contact>,
    pub count: usize,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct UnreadResponse {
    pub uid: String,
    pub unread: usize,
}

// ---------------------------------------------------------------------------
// WebSocket 帧 / WebSocket frames
// ---------------------------------------------------------------------------

/// WebSocket 消息结构 / WebSocket frame `{"type": ..., "data": {...}}`
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct ImFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ImFrame {
    pub fn new(frame_type: &str, data: serde_json::Value) -> Self {
        Self {
            frame_type: frame_type.to_string(),
            data,
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            "error",
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","data":{"code":"internal","message":"encode failed"}}"#.to_string()
        })
    }
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct AuthRequest {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct SubscribeRequest {
    pub scope: SubscribeScope,
    pub id: String,
}

/// 订阅范围 / Subscription scope
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeScope {
    Thread,
    Inbox,
}
